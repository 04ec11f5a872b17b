use image::{GrayImage, Luma};

use crate::{FrameBuffer, PixelFormat};

impl FrameBuffer {
    /// Grayscale view of the frame, the input most barcode decoders expect.
    ///
    /// Semi-planar frames return their luma plane; packed frames are converted
    /// with full-range BT.601 weights.
    #[must_use]
    pub fn to_luma_image(&self) -> GrayImage {
        let width = self.width as usize;
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let index = y as usize * width + x as usize;
            Luma([self.luma_at(index)])
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn luma_at(&self, index: usize) -> u8 {
        let (r, g, b) = match self.format {
            PixelFormat::Nv21 | PixelFormat::Nv12 => return self.data[index],
            PixelFormat::Rgba => {
                let px = &self.data[index * 4..index * 4 + 3];
                (px[0], px[1], px[2])
            }
            PixelFormat::Bgra => {
                let px = &self.data[index * 4..index * 4 + 3];
                (px[2], px[1], px[0])
            }
        };
        ((77 * u32::from(r) + 150 * u32::from(g) + 29 * u32::from(b) + 128) >> 8) as u8
    }
}
