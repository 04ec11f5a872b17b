use crate::{FrameBuffer, FrameError, PixelRect};

pub(crate) fn crop(buffer: &FrameBuffer, rect: &PixelRect) -> Result<FrameBuffer, FrameError> {
    if !rect.fits_within(buffer.width, buffer.height) {
        return Err(FrameError::OutOfBoundsCrop {
            rect: *rect,
            width: buffer.width,
            height: buffer.height,
        });
    }

    let data = if buffer.format.is_semi_planar() {
        if [rect.left, rect.top, rect.width, rect.height]
            .iter()
            .any(|v| v % 2 != 0)
        {
            return Err(FrameError::UnalignedCrop(*rect));
        }
        crop_semi_planar(buffer, rect)
    } else {
        crop_packed(buffer, rect)
    };

    Ok(FrameBuffer {
        data,
        width: rect.width,
        height: rect.height,
        format: buffer.format,
        rotation_degrees: buffer.rotation_degrees,
    })
}

/// Luma rows are copied straight; the chroma plane has half as many rows, each
/// `width` bytes of interleaved pairs, so an even `left` keeps the pairs intact.
fn crop_semi_planar(buffer: &FrameBuffer, rect: &PixelRect) -> Vec<u8> {
    let stride = buffer.width as usize;
    let (left, top) = (rect.left as usize, rect.top as usize);
    let (width, height) = (rect.width as usize, rect.height as usize);

    let (luma, chroma) = buffer.data.split_at(stride * buffer.height as usize);
    let mut out = Vec::with_capacity(width * height * 3 / 2);

    copy_rows(&mut out, luma, stride, left, top..top + height, width);
    copy_rows(
        &mut out,
        chroma,
        stride,
        left,
        top / 2..(top + height) / 2,
        width,
    );
    out
}

fn crop_packed(buffer: &FrameBuffer, rect: &PixelRect) -> Vec<u8> {
    let bpp = buffer.format.bytes_per_pixel();
    let stride = buffer.width as usize * bpp;
    let (width, height) = (rect.width as usize * bpp, rect.height as usize);
    let top = rect.top as usize;

    let mut out = Vec::with_capacity(width * height);
    copy_rows(
        &mut out,
        &buffer.data,
        stride,
        rect.left as usize * bpp,
        top..top + height,
        width,
    );
    out
}

fn copy_rows(
    out: &mut Vec<u8>,
    plane: &[u8],
    stride: usize,
    offset: usize,
    rows: std::ops::Range<usize>,
    len: usize,
) {
    for row in rows {
        let start = row * stride + offset;
        out.extend_from_slice(&plane[start..start + len]);
    }
}
