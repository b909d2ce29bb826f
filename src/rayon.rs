//! Parallel helpers built on [`rayon`].
//!
//! LUT application splits a frame into pixel rows and export rendering
//! splits a selection into frames. Both are pure per item, so the work is
//! spread across the rayon pool with no shared mutable state. Builds without
//! the `rayon` feature take the sequential paths in [`lut`](crate::lut) and
//! [`export`](crate::export).

use ::rayon::{
    iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator},
    slice::ParallelSliceMut,
};

use crate::error::FramePickError;

/// Run `transform` over every row of a packed pixel buffer in parallel.
pub(crate) fn for_each_row<F>(buffer: &mut [u8], row_bytes: usize, transform: F)
where
    F: Fn(&mut [u8]) + Send + Sync,
{
    if row_bytes == 0 {
        return;
    }
    buffer.par_chunks_mut(row_bytes).for_each(|row| transform(row));
}

/// Map `render` over `items` in parallel, keeping input order.
///
/// The first error wins and the remaining results are discarded.
pub(crate) fn try_map_ordered<T, R, F>(items: &[T], render: F) -> Result<Vec<R>, FramePickError>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> Result<R, FramePickError> + Send + Sync,
{
    items
        .par_iter()
        .enumerate()
        .map(|(index, item)| render(index, item))
        .collect()
}
