//! Cache storage seam and its directory implementation

use std::fs;
use std::path::{Path, PathBuf};

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

use super::channel::Channel;
use super::format::{decode, encode};
use crate::constants::cache::{CACHE_VERSION, DIR_CONFIG, DIR_SCRIPT, EXT_PACKED, EXT_RAW};
use crate::domain::{CacheFormat, CacheSettings, DomainState};
use crate::error::{atomic_write, load_error, save_error, DomainError, DomainResult};
use crate::grid::cell_count;
use crate::solver::{fields, ActiveFields, FluidGrids};

/// Named grid fields of one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridFrame {
    pub res: IVec3,
    pub fields: Vec<(String, Vec<f32>)>,
}

impl GridFrame {
    /// Copy the listed fields that exist in `grids`
    pub fn capture(grids: &FluidGrids, names: &[&str]) -> Self {
        let fields = names
            .iter()
            .filter_map(|&name| grids.field(name).map(|f| (name.to_string(), f.clone())))
            .collect();
        Self {
            res: grids.res,
            fields,
        }
    }

    /// Write the stored fields back. Fields the grids do not carry are skipped.
    pub fn apply(&self, grids: &mut FluidGrids, channel: Channel) -> DomainResult<()> {
        if self.res != grids.res {
            return Err(DomainError::CacheMismatch {
                channel: channel.to_string(),
                reason: format!("cached at {:?}, grids are {:?}", self.res, grids.res),
            });
        }
        for (name, values) in &self.fields {
            let target = match grids.field_mut(name) {
                Some(t) => t,
                None => continue,
            };
            if target.len() != values.len() {
                return Err(DomainError::CacheMismatch {
                    channel: channel.to_string(),
                    reason: format!("{} has {} cells, expected {}", name, values.len(), target.len()),
                });
            }
            target.copy_from_slice(values);
        }
        Ok(())
    }
}

/// Domain layout of a baked frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainConfig {
    pub version: String,
    pub base_res: IVec3,
    pub res: IVec3,
    pub res_min: IVec3,
    pub res_max: IVec3,
    pub shift: IVec3,
    pub shift_f: Vec3,
    pub cell_size: Vec3,
    pub p0: Vec3,
    pub p1: Vec3,
    pub dp0: Vec3,
    pub global_size: Vec3,
    pub dx: f32,
    pub active_fields: ActiveFields,
    pub active_color: Vec3,
}

impl DomainConfig {
    pub fn capture(state: &DomainState) -> Self {
        Self {
            version: CACHE_VERSION.to_string(),
            base_res: state.base_res,
            res: state.res,
            res_min: state.res_min,
            res_max: state.res_max,
            shift: state.shift,
            shift_f: state.shift_f,
            cell_size: state.cell_size,
            p0: state.p0,
            p1: state.p1,
            dp0: state.dp0,
            global_size: state.global_size,
            dx: state.dx,
            active_fields: state.active_fields,
            active_color: state.active_color,
        }
    }

    pub fn apply(&self, state: &mut DomainState) {
        state.base_res = self.base_res;
        state.res = self.res;
        state.res_min = self.res_min;
        state.res_max = self.res_max;
        state.shift = self.shift;
        state.shift_f = self.shift_f;
        state.cell_size = self.cell_size;
        state.p0 = self.p0;
        state.p1 = self.p1;
        state.dp0 = self.dp0;
        state.global_size = self.global_size;
        state.dx = self.dx;
        state.active_fields = self.active_fields;
        state.active_color = self.active_color;
        state.total_cells = cell_count(self.res);
    }
}

/// Persistent storage for baked frames
pub trait CacheStore: Send {
    /// Pick up directory or format changes
    fn update_settings(&mut self, settings: &CacheSettings);

    fn has(&self, channel: Channel, frame: i32) -> bool;

    fn read_config(&self, frame: i32) -> DomainResult<Option<DomainConfig>>;

    fn write_config(&mut self, frame: i32, config: &DomainConfig) -> DomainResult<()>;

    /// Load grids of `channel`. `full` also loads the resume fields when present.
    /// Returns false when the frame is not cached.
    fn read_grids(&self, channel: Channel, frame: i32, grids: &mut FluidGrids, full: bool) -> DomainResult<bool>;

    fn write_grids(&mut self, channel: Channel, frame: i32, grids: &FluidGrids, resumable: bool) -> DomainResult<()>;

    /// Opaque solver payload of the mesh or particles channel
    fn read_blob(&self, channel: Channel, frame: i32) -> DomainResult<Option<Vec<u8>>>;

    fn write_blob(&mut self, channel: Channel, frame: i32, payload: &[u8]) -> DomainResult<()>;

    fn write_script(&mut self, script: &str) -> DomainResult<()>;

    /// Delete everything stored for `channel`
    fn free(&mut self, channel: Channel) -> DomainResult<()>;
}

/// Field lists of the display and resume files of a channel
fn channel_fields(channel: Channel) -> (&'static [&'static str], &'static [&'static str]) {
    match channel {
        Channel::Data => (fields::DATA_DISPLAY, fields::DATA_RESUME),
        Channel::Noise => (fields::NOISE_DISPLAY, fields::NOISE_RESUME),
        Channel::Guide => (fields::GUIDE, &[]),
        Channel::Mesh | Channel::Particles => (&[], &[]),
    }
}

/// Cache rooted at a directory, one subdirectory per channel
#[derive(Debug, Clone)]
pub struct DirectoryCache {
    root: PathBuf,
    data_format: CacheFormat,
    noise_format: CacheFormat,
    mesh_format: CacheFormat,
    particle_format: CacheFormat,
}

impl DirectoryCache {
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            root: settings.directory.clone(),
            data_format: settings.data_format,
            noise_format: settings.noise_format,
            mesh_format: settings.mesh_format,
            particle_format: settings.particle_format,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn format(&self, channel: Channel) -> CacheFormat {
        match channel {
            Channel::Data | Channel::Guide => self.data_format,
            Channel::Noise => self.noise_format,
            Channel::Mesh => self.mesh_format,
            Channel::Particles => self.particle_format,
        }
    }

    fn extension(format: CacheFormat) -> &'static str {
        match format {
            CacheFormat::Raw => EXT_RAW,
            CacheFormat::Packed => EXT_PACKED,
        }
    }

    /// `<root>/<channel>/<stem><suffix>_<frame>.<ext>`
    fn frame_path(&self, channel: Channel, frame: i32, suffix: &str) -> PathBuf {
        let ext = Self::extension(self.format(channel));
        self.root
            .join(channel.dir_name())
            .join(format!("{}{}_{:04}.{}", channel.file_stem(), suffix, frame, ext))
    }

    fn config_path(&self, frame: i32) -> PathBuf {
        self.root
            .join(DIR_CONFIG)
            .join(format!("config_{:04}.{}", frame, EXT_PACKED))
    }

    fn script_path(&self) -> PathBuf {
        self.root.join(DIR_SCRIPT).join("setup.json")
    }

    fn read_file(path: &Path) -> DomainResult<Option<Vec<u8>>> {
        if !path.exists() {
            return Ok(None);
        }
        fs::read(path).map(Some).map_err(|e| load_error(path, e))
    }

    fn read_frame(&self, path: &Path, grids: &mut FluidGrids, channel: Channel) -> DomainResult<bool> {
        match Self::read_file(path)? {
            Some(bytes) => {
                let frame: GridFrame = decode(&bytes)?;
                frame.apply(grids, channel)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove_dir(path: &Path) -> DomainResult<()> {
        if path.exists() {
            fs::remove_dir_all(path).map_err(|e| save_error(path, e))?;
        }
        Ok(())
    }
}

impl CacheStore for DirectoryCache {
    fn update_settings(&mut self, settings: &CacheSettings) {
        if settings.directory != self.root {
            log::debug!(
                "[cache::update_settings] Cache directory changed to {}",
                settings.directory.display()
            );
        }
        *self = Self::new(settings);
    }

    fn has(&self, channel: Channel, frame: i32) -> bool {
        self.frame_path(channel, frame, "").exists()
    }

    fn read_config(&self, frame: i32) -> DomainResult<Option<DomainConfig>> {
        let path = self.config_path(frame);
        let bytes = match Self::read_file(&path)? {
            Some(b) => b,
            None => return Ok(None),
        };
        let config: DomainConfig = decode(&bytes)?;
        if config.version != CACHE_VERSION {
            return Err(DomainError::VersionMismatch {
                expected: CACHE_VERSION.to_string(),
                found: config.version,
            });
        }
        Ok(Some(config))
    }

    fn write_config(&mut self, frame: i32, config: &DomainConfig) -> DomainResult<()> {
        let bytes = encode(config, CacheFormat::Packed)?;
        atomic_write(&self.config_path(frame), &bytes)
    }

    fn read_grids(&self, channel: Channel, frame: i32, grids: &mut FluidGrids, full: bool) -> DomainResult<bool> {
        if !self.read_frame(&self.frame_path(channel, frame, ""), grids, channel)? {
            return Ok(false);
        }
        if full {
            let resume = self.frame_path(channel, frame, "_resume");
            if !self.read_frame(&resume, grids, channel)? {
                log::debug!(
                    "[cache::read_grids] No resume file for {} frame {}",
                    channel,
                    frame
                );
            }
        }
        Ok(true)
    }

    fn write_grids(&mut self, channel: Channel, frame: i32, grids: &FluidGrids, resumable: bool) -> DomainResult<()> {
        let format = self.format(channel);
        let (display, resume) = channel_fields(channel);

        let bytes = encode(&GridFrame::capture(grids, display), format)?;
        atomic_write(&self.frame_path(channel, frame, ""), &bytes)?;

        if resumable && !resume.is_empty() {
            let bytes = encode(&GridFrame::capture(grids, resume), format)?;
            atomic_write(&self.frame_path(channel, frame, "_resume"), &bytes)?;
        }
        Ok(())
    }

    fn read_blob(&self, channel: Channel, frame: i32) -> DomainResult<Option<Vec<u8>>> {
        match Self::read_file(&self.frame_path(channel, frame, ""))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write_blob(&mut self, channel: Channel, frame: i32, payload: &[u8]) -> DomainResult<()> {
        let bytes = encode(&payload.to_vec(), self.format(channel))?;
        atomic_write(&self.frame_path(channel, frame, ""), &bytes)
    }

    fn write_script(&mut self, script: &str) -> DomainResult<()> {
        atomic_write(&self.script_path(), script.as_bytes())
    }

    fn free(&mut self, channel: Channel) -> DomainResult<()> {
        Self::remove_dir(&self.root.join(channel.dir_name()))?;
        if channel == Channel::Data {
            Self::remove_dir(&self.root.join(DIR_CONFIG))?;
            Self::remove_dir(&self.root.join(DIR_SCRIPT))?;
        }
        log::info!(
            "[cache::free] Freed {} cache in {}",
            channel,
            self.root.display()
        );
        Ok(())
    }
}
