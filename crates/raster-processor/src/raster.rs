//! In-memory single-band rasters.

/// A row-major grid of `f32` samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
}

impl Raster {
    pub fn new(data: Vec<f32>, width: usize, height: usize) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self { data, width, height }
    }

    pub fn zeros(width: usize, height: usize) -> Self {
        Self::new(vec![0.0; width * height], width, height)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Copy of the `w` x `h` region starting at `(x0, y0)`.
    ///
    /// The region must lie inside the raster.
    pub fn crop(&self, x0: usize, y0: usize, w: usize, h: usize) -> Raster {
        let mut data = Vec::with_capacity(w * h);
        for row in self.data.chunks_exact(self.width.max(1)).skip(y0).take(h) {
            data.extend_from_slice(&row[x0..x0 + w]);
        }
        Raster::new(data, w, h)
    }

    /// Subtract `other` pixel by pixel. Shapes must match.
    pub fn subtract(&mut self, other: &Raster) {
        debug_assert_eq!((self.width, self.height), (other.width, other.height));
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a -= b;
        }
    }
}
