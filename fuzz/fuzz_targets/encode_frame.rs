#![no_main]

//! Fuzz target for the encode driver.
//! Arbitrary dimensions, band counts and options must either encode to a
//! valid container or fail cleanly.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use webpsave::{write_to_buffer, EncodeOptions, Frame, MetadataSet};

#[derive(Debug, Arbitrary)]
struct Input {
    width: u8,
    height: u8,
    bands: u8,
    quality: u8,
    lossless: bool,
    near_lossless: Option<u8>,
    smart_subsample: bool,
    xmp: Option<Vec<u8>>,
    pixels: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let mut options = EncodeOptions::new()
        .quality(input.quality)
        .lossless(input.lossless)
        .smart_subsample(input.smart_subsample);
    if let Some(strength) = input.near_lossless {
        options = options.near_lossless(strength);
    }

    let mut metadata = MetadataSet::new();
    if let Some(xmp) = input.xmp {
        metadata.insert("xmp", xmp);
    }
    let mut frame = Frame::new(
        input.pixels,
        input.width as u32,
        input.height as u32,
        input.bands,
    )
    .with_metadata(metadata);

    if let Ok(bytes) = write_to_buffer(&mut frame, &options) {
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
        let declared = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        assert_eq!(declared, bytes.len() - 8);
    }
});
