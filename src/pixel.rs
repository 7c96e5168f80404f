//! Pixel format conversion for framebuffer reads
//!
//! A framebuffer read in RGBA/unsigned-byte format lands in memory as
//! R, G, B, A bytes. Read as little-endian `u32` words that is `0xAABBGGRR`.
//! ARGB8888 images want `0xAARRGGBB`, so red and blue trade places while
//! alpha and green stay put.
//!
//! Both conversions work in place and never touch GPU state.

/// Swap the red and blue channels of one packed pixel.
#[inline]
pub fn rgba_to_argb(rgba: u32) -> u32 {
    (rgba & 0xFF00_FF00) // alpha + green
        | ((rgba << 16) & 0x00FF_0000) // red
        | ((rgba >> 16) & 0x0000_00FF) // blue
}

/// Convert every pixel in place, keeping row order.
///
/// Used for off-screen render targets whose rows already match image order.
pub fn convert_rgba_to_argb(pixels: &mut [u32]) {
    for pixel in pixels.iter_mut() {
        *pixel = rgba_to_argb(*pixel);
    }
}

/// Convert every pixel and flip the buffer vertically.
///
/// Row `i` trades places with row `height - 1 - i`, both converted during the
/// swap. With an odd height the middle row is converted where it is.
/// Used for the visible surface, which is stored bottom row first.
pub fn convert_rgba_to_argb_and_flip(pixels: &mut [u32], width: usize, height: usize) {
    debug_assert!(pixels.len() >= width * height);

    for i in 0..height / 2 {
        let top_offset = i * width;
        let bottom_offset = (height - i - 1) * width;

        // Split so we can hold both rows mutably at once
        let (head, tail) = pixels.split_at_mut(bottom_offset);
        let top_row = &mut head[top_offset..top_offset + width];
        let bottom_row = &mut tail[..width];

        for (top, bottom) in top_row.iter_mut().zip(bottom_row.iter_mut()) {
            let top_argb = rgba_to_argb(*top);
            *top = rgba_to_argb(*bottom);
            *bottom = top_argb;
        }
    }

    if height % 2 != 0 {
        let middle_offset = (height / 2) * width;
        convert_rgba_to_argb(&mut pixels[middle_offset..middle_offset + width]);
    }
}

/// Pack four RGBA bytes into a word the way a framebuffer read lays them out.
#[inline]
pub fn pack_rgba_bytes(bytes: [u8; 4]) -> u32 {
    u32::from_le_bytes(bytes)
}
