use super::format::{decode, encode};
use super::*;
use crate::domain::{CacheFormat, CacheSettings, DomainState, DomainType};
use crate::error::DomainError;
use crate::solver::{ActiveFields, FluidGrids, GridLayout};
use glam::{IVec3, Vec3};
use tempfile::TempDir;

fn cache_settings(dir: &TempDir, format: CacheFormat) -> CacheSettings {
    CacheSettings {
        directory: dir.path().to_path_buf(),
        data_format: format,
        noise_format: format,
        mesh_format: format,
        particle_format: format,
        ..CacheSettings::default()
    }
}

fn gas_grids(res: IVec3) -> FluidGrids {
    let layout = GridLayout {
        domain_type: DomainType::Gas,
        active_fields: ActiveFields::default(),
        active_color: Vec3::ZERO,
        noise_scale: None,
    };
    FluidGrids::try_new(res, &layout).expect("grids")
}

#[test]
fn test_encode_decode_packed_and_raw() {
    let values: Vec<f32> = (0..64).map(|i| i as f32 * 0.5).collect();
    for format in [CacheFormat::Raw, CacheFormat::Packed] {
        let bytes = encode(&values, format).unwrap();
        let back: Vec<f32> = decode(&bytes).unwrap();
        assert_eq!(back, values);
    }
}

#[test]
fn test_decode_rejects_flipped_body_byte() {
    let values = vec![1.0f32; 32];
    let mut bytes = encode(&values, CacheFormat::Raw).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;

    match decode::<Vec<f32>>(&bytes) {
        Err(DomainError::CorruptedData(msg)) => assert!(msg.contains("Checksum")),
        other => panic!("expected checksum failure, got {:?}", other),
    }
}

#[test]
fn test_decode_rejects_foreign_file() {
    let junk = b"this is not a frame file at all".to_vec();
    assert!(decode::<Vec<f32>>(&junk).is_err());
}

#[test]
fn test_packed_compresses_uniform_grid() {
    let zeros = vec![0u8; 4096];
    let packed = Compressor::for_format(CacheFormat::Packed).compress(&zeros).unwrap();
    assert!(packed.len() < zeros.len() / 4);
    let raw = Compressor::for_format(CacheFormat::Raw).compress(&zeros).unwrap();
    assert_eq!(raw.len(), zeros.len());
}

#[test]
fn test_channel_state_transitions() {
    let mut states = ChannelStates::default();
    states.begin_bake(&[Channel::Data, Channel::Noise]);
    assert!(states.is_baking(Channel::Data));
    assert_eq!(states.baking(), vec![Channel::Data, Channel::Noise]);

    states.pause_bake(Channel::Data, 12);
    assert!(!states.is_baking(Channel::Data));
    assert_eq!(states.pause_frame(Channel::Data), 12);
    assert!(!states.get(Channel::Data).baked);

    states.begin_bake(&[Channel::Data]);
    states.finish_bake(Channel::Data);
    let data = states.get(Channel::Data);
    assert!(data.baked && !data.baking);
    assert_eq!(data.pause_frame, 0);

    states.get_mut(Channel::Noise).mark_outdated();
    assert!(states.any_outdated());
    assert!(!states.is_baking(Channel::Noise));
}

#[test]
fn test_directory_cache_grid_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut store = DirectoryCache::new(&cache_settings(&dir, CacheFormat::Packed));
    let res = IVec3::new(4, 3, 2);

    let mut grids = gas_grids(res);
    if let Some(smoke) = grids.smoke.as_mut() {
        for (i, d) in smoke.density.iter_mut().enumerate() {
            *d = i as f32 / 24.0;
        }
    }
    grids.velocity.fill(Vec3::new(0.5, -1.0, 2.0));

    assert!(!store.has(Channel::Data, 3));
    store.write_grids(Channel::Data, 3, &grids, true).unwrap();
    assert!(store.has(Channel::Data, 3));
    assert!(dir.path().join("data").join("fluid_data_0003.pk").exists());
    assert!(dir.path().join("data").join("fluid_data_resume_0003.pk").exists());

    let mut partial = gas_grids(res);
    assert!(store.read_grids(Channel::Data, 3, &mut partial, false).unwrap());
    assert_eq!(partial.density(), grids.density());
    assert_eq!(partial.velocity.get(5), Vec3::ZERO);

    let mut full = gas_grids(res);
    assert!(store.read_grids(Channel::Data, 3, &mut full, true).unwrap());
    assert_eq!(full.velocity.get(5), Vec3::new(0.5, -1.0, 2.0));

    let mut missing = gas_grids(res);
    assert!(!store.read_grids(Channel::Data, 4, &mut missing, true).unwrap());
}

#[test]
fn test_read_grids_rejects_other_resolution() {
    let dir = TempDir::new().unwrap();
    let mut store = DirectoryCache::new(&cache_settings(&dir, CacheFormat::Raw));
    store
        .write_grids(Channel::Data, 1, &gas_grids(IVec3::splat(4)), false)
        .unwrap();

    let mut other = gas_grids(IVec3::splat(5));
    assert!(matches!(
        store.read_grids(Channel::Data, 1, &mut other, false),
        Err(DomainError::CacheMismatch { .. })
    ));
}

#[test]
fn test_config_round_trip_restores_layout() {
    let dir = TempDir::new().unwrap();
    let mut store = DirectoryCache::new(&cache_settings(&dir, CacheFormat::Raw));

    let state = DomainState {
        base_res: IVec3::new(32, 16, 16),
        res: IVec3::new(10, 8, 6),
        res_min: IVec3::new(3, 2, 1),
        res_max: IVec3::new(13, 10, 7),
        shift: IVec3::new(1, 0, 0),
        ..DomainState::default()
    };
    store.write_config(7, &DomainConfig::capture(&state)).unwrap();
    assert!(dir.path().join("config").join("config_0007.pk").exists());

    let config = store.read_config(7).unwrap().expect("config");
    let mut restored = DomainState::default();
    config.apply(&mut restored);
    assert_eq!(restored.res, state.res);
    assert_eq!(restored.res_min, state.res_min);
    assert_eq!(restored.shift, state.shift);
    assert_eq!(restored.total_cells, 10 * 8 * 6);

    assert!(store.read_config(8).unwrap().is_none());
}

#[test]
fn test_blob_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut store = DirectoryCache::new(&cache_settings(&dir, CacheFormat::Raw));
    store.write_blob(Channel::Mesh, 2, b"surface").unwrap();
    assert_eq!(store.read_blob(Channel::Mesh, 2).unwrap(), Some(b"surface".to_vec()));
    assert_eq!(store.read_blob(Channel::Mesh, 3).unwrap(), None);
}

#[test]
fn test_free_data_removes_config_and_script() {
    let dir = TempDir::new().unwrap();
    let mut store = DirectoryCache::new(&cache_settings(&dir, CacheFormat::Packed));
    let grids = gas_grids(IVec3::splat(2));

    store.write_grids(Channel::Data, 1, &grids, false).unwrap();
    store.write_grids(Channel::Noise, 1, &grids, false).unwrap();
    store
        .write_config(1, &DomainConfig::capture(&DomainState::default()))
        .unwrap();
    store.write_script("{}").unwrap();

    store.free(Channel::Data).unwrap();
    assert!(!dir.path().join("data").exists());
    assert!(!dir.path().join("config").exists());
    assert!(!dir.path().join("script").exists());
    assert!(store.has(Channel::Noise, 1));

    // freeing an empty channel is fine
    store.free(Channel::Guide).unwrap();
}

#[test]
fn test_update_settings_follows_new_directory() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let mut store = DirectoryCache::new(&cache_settings(&first, CacheFormat::Raw));
    store.update_settings(&cache_settings(&second, CacheFormat::Packed));
    assert_eq!(store.root(), second.path());

    store
        .write_grids(Channel::Data, 1, &gas_grids(IVec3::splat(2)), false)
        .unwrap();
    assert!(second.path().join("data").join("fluid_data_0001.pk").exists());
}
