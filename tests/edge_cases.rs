// tests/edge_cases.rs
//
// Edge case tests for webpsave
// Tests boundary values, invalid inputs, and error handling

use image::{DynamicImage, RgbImage};
use webpsave::engine::{MAX_DIMENSION, SINK_LIMIT};
use webpsave::{
    write_to_buffer, ByteSink, EncodeOptions, ErrorCategory, Frame, MetadataSet, Preset,
    WebpSaveError,
};

fn create_test_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

mod minimal_image_tests {
    use super::*;

    #[test]
    fn test_1x1_lossy() {
        let img = create_test_image(1, 1);
        let bytes = write_to_buffer(&mut Frame::from_image(&img), &EncodeOptions::new()).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
    }

    #[test]
    fn test_1x1_lossless_with_metadata() {
        let img = create_test_image(1, 1);
        let mut frame =
            Frame::from_image(&img).with_metadata(MetadataSet::new().with_xmp(b"<x/>".to_vec()));
        let bytes = write_to_buffer(&mut frame, &EncodeOptions::new().lossless(true)).unwrap();
        assert_eq!(&bytes[12..16], b"VP8X");
        // canvas 1x1 is stored as zeros
        assert_eq!(&bytes[24..30], &[0u8; 6]);
    }

    #[test]
    fn test_odd_width_rgba() {
        let pixels = vec![255u8; 7 * 3 * 4];
        let mut frame = Frame::new(pixels, 7, 3, 4);
        assert!(write_to_buffer(&mut frame, &EncodeOptions::new()).is_ok());
    }
}

mod invalid_input_tests {
    use super::*;

    #[test]
    fn test_two_band_frame_is_encode_error() {
        let mut frame = Frame::new(vec![0u8; 10 * 10 * 2], 10, 10, 2);
        let err = write_to_buffer(&mut frame, &EncodeOptions::new()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Encode);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let mut frame = Frame::new(Vec::new(), 0, 10, 3);
        let err = write_to_buffer(&mut frame, &EncodeOptions::new()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Encode);
    }

    #[test]
    fn test_truncated_pixels_rejected() {
        let mut frame = Frame::new(vec![0u8; 5], 4, 4, 3);
        let err = write_to_buffer(&mut frame, &EncodeOptions::new()).unwrap_err();
        assert!(matches!(err, WebpSaveError::ImportFailed { .. }));
    }

    #[test]
    fn test_dimension_limit() {
        let mut frame = Frame::new(Vec::new(), MAX_DIMENSION + 1, 1, 3);
        let err = write_to_buffer(&mut frame, &EncodeOptions::new()).unwrap_err();
        assert!(matches!(err, WebpSaveError::DimensionExceedsLimit { .. }));
    }
}

mod config_tests {
    use super::*;

    #[test]
    fn test_quality_above_100_is_config_error() {
        let img = create_test_image(4, 4);
        let err = write_to_buffer(&mut Frame::from_image(&img), &EncodeOptions::new().quality(101))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_near_lossless_above_100_is_config_error() {
        let img = create_test_image(4, 4);
        let options = EncodeOptions::new().near_lossless(255);
        let err = write_to_buffer(&mut Frame::from_image(&img), &options).unwrap_err();
        assert!(matches!(err, WebpSaveError::InvalidConfig { .. }));
    }

    #[test]
    fn test_boundary_qualities() {
        let img = create_test_image(8, 8);
        for quality in [0u8, 100] {
            let options = EncodeOptions::new().quality(quality).alpha_quality(quality);
            assert!(write_to_buffer(&mut Frame::from_image(&img), &options).is_ok());
        }
    }

    #[test]
    fn test_unknown_preset_name() {
        let err = "watercolour".parse::<Preset>().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Config);
        assert_eq!("PHOTO".parse::<Preset>().unwrap(), Preset::Photo);
    }
}

mod memory_tests {
    use super::*;

    #[test]
    fn test_five_gib_growth_fails_before_allocating() {
        let mut sink = ByteSink::new();
        let err = sink.reserve(5 * 1024 * 1024 * 1024).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Memory);
        assert_eq!(sink.capacity(), 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_growth_to_exact_limit_fails() {
        let mut sink = ByteSink::new();
        assert!(sink.reserve(SINK_LIMIT).is_err());
        assert_eq!(sink.capacity(), 0);
    }

    #[test]
    fn test_tiny_limit_fails_cleanly() {
        let mut sink = ByteSink::with_limit(12);
        sink.append(b"RIFF\0\0\0\0WEB").unwrap();
        let err = sink.append(b"P").unwrap_err();
        assert!(matches!(err, WebpSaveError::SizeLimitExceeded { .. }));
        assert_eq!(sink.as_bytes(), b"RIFF\0\0\0\0WEB");
    }
}
