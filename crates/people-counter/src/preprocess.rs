//! Frame preprocessing

use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::{Array4, ArrayD};

use crate::CounterError;

/// Resize `image` to an `[N, C, H, W]` input and lay it out channel-first.
///
/// Channels are written in BGR order with raw 0..=255 values, batch of one.
pub fn preprocess(image: &DynamicImage, input_shape: &[usize]) -> Result<ArrayD<f32>, CounterError> {
    let &[batch, channels, height, width] = input_shape else {
        return Err(CounterError::InputLayout(format!(
            "expected [N, C, H, W], got {:?}",
            input_shape
        )));
    };
    if batch != 1 || channels != 3 || height == 0 || width == 0 {
        return Err(CounterError::InputLayout(format!(
            "expected a batch of one 3-channel frame, got {:?}",
            input_shape
        )));
    }

    let rgb = image.to_rgb8();
    let resized = image::imageops::resize(&rgb, width as u32, height as u32, FilterType::Triangle);

    let mut input = Array4::<f32>::zeros((1, 3, height, width));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        input[[0, 0, y, x]] = pixel[2] as f32;
        input[[0, 1, y, x]] = pixel[1] as f32;
        input[[0, 2, y, x]] = pixel[0] as f32;
    }

    Ok(input.into_dyn())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_output_layout() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(64, 48));
        let input = preprocess(&image, &[1, 3, 30, 40]).unwrap();
        assert_eq!(input.shape(), &[1, 3, 30, 40]);
    }

    #[test]
    fn test_channels_in_bgr_order() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([200, 100, 10])));
        let input = preprocess(&image, &[1, 3, 4, 4]).unwrap();
        let input = input.into_dimensionality::<ndarray::Ix4>().unwrap();

        assert_eq!(input[[0, 0, 2, 2]], 10.0);
        assert_eq!(input[[0, 1, 2, 2]], 100.0);
        assert_eq!(input[[0, 2, 2, 2]], 200.0);
    }

    #[test]
    fn test_grayscale_expanded_to_three_channels() {
        let image = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(4, 4, image::Luma([77])));
        let input = preprocess(&image, &[1, 3, 4, 4]).unwrap();
        assert!(input.iter().all(|v| *v == 77.0));
    }

    #[test]
    fn test_rejects_unsupported_layouts() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        for shape in [&[1, 3, 4][..], &[2, 3, 4, 4], &[1, 1, 4, 4], &[1, 3, 0, 4]] {
            assert!(matches!(preprocess(&image, shape), Err(CounterError::InputLayout(_))));
        }
    }
}
