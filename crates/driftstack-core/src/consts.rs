/// Minimum pixel count (h*w) before the anchor scan runs rows in parallel.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Minimum number of candidate offsets times window samples before the
/// hierarchical search fans out over the Rayon pool.
pub const PARALLEL_SEARCH_THRESHOLD: usize = 4_000_000;

/// Largest element count of a single mapped segment of the out-of-core store.
/// Keeps each 4-byte-per-element mapping under 2 GiB.
pub const DEFAULT_SEGMENT_ELEMENTS: u64 = (i32::MAX / 4) as u64;

/// BT.709 luminance coefficient for the red channel.
pub const LUMINANCE_R: f32 = 0.2126;

/// BT.709 luminance coefficient for the green channel.
pub const LUMINANCE_G: f32 = 0.7152;

/// BT.709 luminance coefficient for the blue channel.
pub const LUMINANCE_B: f32 = 0.0722;

/// Default half-extent of the full alignment window.
pub const DEFAULT_RADIUS: usize = 100;

/// Default maximum search offset in each axis.
pub const DEFAULT_MAX_OFFSET: usize = 200;

/// Multiplier applied to the best stage error to form the early-rejection gate.
pub const DEFAULT_FAST_ERROR_THRESHOLD: f64 = 1.1;

/// Best-error sentinel before any offset has been accepted.
/// Samples are normalized to [0.0, 1.0], so no real average error exceeds it.
pub const INITIAL_BEST_ERROR: f64 = 1.0;

/// Fraction of width/height skipped at each border by the anchor scan.
pub const DEFAULT_ANCHOR_INSET: f64 = 0.25;

/// Divisor of the radius giving the anchor scan step.
pub const DEFAULT_ANCHOR_STEP_FACTOR: usize = 1;

/// Maximum alignment error for an aligned frame to count as good.
pub const DEFAULT_ERROR_THRESHOLD: f64 = 1e-3;

/// Radius of the median filter applied before alignment; `0` disables it.
pub const DEFAULT_MEDIAN_RADIUS: usize = 1;

/// Gain applied to the residual written by debug runs.
pub const DEBUG_DELTA_FACTOR: f32 = 10.0;
