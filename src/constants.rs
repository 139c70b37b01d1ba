// Fluid Domain Constants
//
// Numeric conventions shared by the samplers, the resizer and the cache.
// Values here are part of the cache contract: changing them invalidates baked frames.

/// Level-set and grid conventions
pub mod grid {
    /// "Far" distance used to initialise every level set
    pub const PHI_MAX: f32 = 9999.0;

    /// Generic float comparison epsilon
    pub const EPSILON: f32 = 1.0e-6;

    /// Seed for adaptive content bounds before the scan
    pub const ADAPT_BOUND_SENTINEL: i32 = 32767;

    /// Bit in the solver flag grid marking an obstacle cell
    pub const FLAG_OBSTACLE: i32 = 2;

    /// Number of rays cast for the inside/outside test
    pub const RAY_COUNT: usize = 26;

    /// Sign-test rays: 6 axes, 12 planar diagonals, 8 octant diagonals (unnormalised)
    pub const RAY_DIRECTIONS: [[f32; 3]; RAY_COUNT] = [
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [-1.0, 0.0, 0.0],
        [0.0, -1.0, 0.0],
        [0.0, 0.0, -1.0],
        [1.0, 1.0, 0.0],
        [1.0, -1.0, 0.0],
        [-1.0, 1.0, 0.0],
        [-1.0, -1.0, 0.0],
        [1.0, 0.0, 1.0],
        [1.0, 0.0, -1.0],
        [-1.0, 0.0, 1.0],
        [-1.0, 0.0, -1.0],
        [0.0, 1.0, 1.0],
        [0.0, 1.0, -1.0],
        [0.0, -1.0, 1.0],
        [0.0, -1.0, -1.0],
        [1.0, 1.0, 1.0],
        [1.0, -1.0, 1.0],
        [-1.0, 1.0, 1.0],
        [-1.0, -1.0, 1.0],
        [1.0, 1.0, -1.0],
        [1.0, -1.0, -1.0],
        [-1.0, 1.0, -1.0],
        [-1.0, -1.0, -1.0],
    ];
}

/// Geometry sampling constants
pub mod sampling {
    /// Nearest-surface search radius in cells (sqrt(3))
    pub const SURFACE_SEARCH_RADIUS: f32 = 1.732;

    /// Mesh bounding box padding in cells, before rounding up (3 * sqrt(3))
    pub const MESH_BOUNDS_MARGIN: f32 = 5.196;

    /// Smoothing band added around solid particle radius
    pub const PARTICLE_SMOOTH_RADIUS: f32 = 0.5;

    /// Solid particle radius as a fraction of particle size
    pub const PARTICLE_SOLID_FACTOR: f32 = 0.5;
}

/// Time conventions
pub mod time {
    /// Frame rate the unit time step refers to
    pub const FPS_REFERENCE: f32 = 25.0;

    /// Solver time step at the reference frame rate
    pub const DT_DEFAULT: f32 = 0.1;
}

/// Force and lighting constants
pub mod forces {
    /// Scale applied to effector forces before clamping
    pub const EFFECTOR_FORCE_SCALE: f32 = 0.2;

    /// Per-component clamp for the force field
    pub const EFFECTOR_FORCE_LIMIT: f32 = 1.0;

    /// Opacity factor for the shadow march, multiplied by dx
    pub const SHADOW_OPACITY: f32 = -7.0;
}

/// Cache file conventions
pub mod cache {
    /// Written into every config record
    pub const CACHE_VERSION: &str = "FLUID_DOMAIN_CACHE_1";

    /// Header magic for frame files
    pub const FRAME_MAGIC: [u8; 4] = *b"FDCF";

    /// Frame file layout version
    pub const FRAME_FORMAT_VERSION: u32 = 1;

    pub const DIR_DATA: &str = "data";
    pub const DIR_NOISE: &str = "noise";
    pub const DIR_MESH: &str = "mesh";
    pub const DIR_PARTICLES: &str = "particles";
    pub const DIR_GUIDE: &str = "guide";
    pub const DIR_CONFIG: &str = "config";
    pub const DIR_SCRIPT: &str = "script";

    pub const EXT_RAW: &str = "raw";
    pub const EXT_PACKED: &str = "pk";
}
