use image::GrayImage;

/// Below this distance from the local mean a pixel is classified against the
/// global mean instead, so flat regions keep their polarity.
const MIN_LOCAL_CONTRAST: f32 = 8.0;

/// Histogram equalization. A constant image is returned unchanged.
pub fn equalize_histogram(img: &GrayImage) -> GrayImage {
    let mut hist = [0u64; 256];
    for p in img.as_raw() {
        hist[*p as usize] += 1;
    }
    let total: u64 = hist.iter().sum();
    let mut cdf = [0u64; 256];
    let mut acc = 0;
    for (c, h) in cdf.iter_mut().zip(hist) {
        acc += h;
        *c = acc;
    }
    let cdf_min = cdf.iter().copied().find(|c| *c > 0).unwrap_or(0);
    if total == cdf_min {
        return img.clone();
    }
    let denom = (total - cdf_min) as f64;
    let lut: Vec<u8> = cdf
        .iter()
        .map(|c| {
            let v = (c.saturating_sub(cdf_min)) as f64 * 255.0 / denom;
            v.round().clamp(0.0, 255.0) as u8
        })
        .collect();
    let data = img.as_raw().iter().map(|p| lut[*p as usize]).collect();
    GrayImage::from_raw(img.width(), img.height(), data).unwrap_or_else(|| img.clone())
}

/// Summed-area table with one row and column of zero padding.
pub fn integral_image(img: &GrayImage) -> Vec<u64> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let src = img.as_raw();
    let stride = w + 1;
    let mut sums = vec![0u64; stride * (h + 1)];
    for y in 0..h {
        let mut row = 0u64;
        for x in 0..w {
            row += src[y * w + x] as u64;
            sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
        }
    }
    sums
}

/// Default local window radius for [`adaptive_threshold`].
pub fn default_threshold_radius(dimensions: (u32, u32)) -> u32 {
    (dimensions.0.max(dimensions.1) / 10).max(7)
}

/// Binarizes against the mean of a `(2r + 1)²` window clipped to the image.
pub fn adaptive_threshold(img: &GrayImage, radius: u32) -> GrayImage {
    let (w, h) = (img.width() as usize, img.height() as usize);
    if w == 0 || h == 0 {
        return img.clone();
    }
    let src = img.as_raw();
    let sums = integral_image(img);
    let stride = w + 1;
    let r = radius as usize;
    let global_mean = sums[h * stride + w] as f32 / (w * h) as f32;

    let mut out = vec![0u8; w * h];
    for y in 0..h {
        let y0 = y.saturating_sub(r);
        let y1 = (y + r + 1).min(h);
        for x in 0..w {
            let x0 = x.saturating_sub(r);
            let x1 = (x + r + 1).min(w);
            let area = ((x1 - x0) * (y1 - y0)) as f32;
            let sum = sums[y1 * stride + x1] + sums[y0 * stride + x0]
                - sums[y0 * stride + x1]
                - sums[y1 * stride + x0];
            let mean = sum as f32 / area;
            let p = src[y * w + x] as f32;
            let white = if (p - mean).abs() < MIN_LOCAL_CONTRAST {
                p > global_mean
            } else {
                p > mean
            };
            out[y * w + x] = if white { 255 } else { 0 };
        }
    }
    GrayImage::from_raw(img.width(), img.height(), out).unwrap_or_else(|| img.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_image_sums() {
        let img = GrayImage::from_fn(4, 3, |x, y| image::Luma([(x + y) as u8]));
        let sums = integral_image(&img);
        let total: u64 = img.as_raw().iter().map(|p| *p as u64).sum();
        assert_eq!(sums[3 * 5 + 4], total);
        assert_eq!(sums[0], 0);
    }

    #[test]
    fn threshold_keeps_flat_region_polarity() {
        let img = GrayImage::from_fn(60, 60, |x, _| {
            if x < 20 { image::Luma([10]) } else { image::Luma([240]) }
        });
        let bin = adaptive_threshold(&img, 5);
        assert_eq!(bin.get_pixel(2, 30)[0], 0);
        assert_eq!(bin.get_pixel(50, 30)[0], 255);
    }

    #[test]
    fn equalization_stretches_range() {
        let img = GrayImage::from_fn(10, 10, |x, _| image::Luma([100 + x as u8]));
        let eq = equalize_histogram(&img);
        assert_eq!(eq.get_pixel(0, 0)[0], 0);
        assert_eq!(eq.get_pixel(9, 0)[0], 255);
    }
}
