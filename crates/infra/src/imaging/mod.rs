//! Photo preparation for green-area uploads

mod optimizer;

pub use optimizer::{ImageOptimizer, ImageSource, JpegImageOptimizer, OptimizedImage};
