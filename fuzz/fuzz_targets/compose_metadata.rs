#![no_main]

//! Fuzz target for container rebuilding.
//! Feeds arbitrary "encoder output" and metadata blobs to the composer and
//! checks that whatever comes back is a self-consistent RIFF stream.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use webpsave::{compose_metadata, ByteSink, Frame, MetadataSet};

#[derive(Debug, Arbitrary)]
struct Input {
    stream: Vec<u8>,
    width: u16,
    height: u16,
    icc: Option<Vec<u8>>,
    exif: Option<Vec<u8>>,
    xmp: Option<Vec<u8>>,
    strip: bool,
}

fuzz_target!(|input: Input| {
    let mut base = ByteSink::new();
    if base.append(&input.stream).is_err() {
        return;
    }

    let mut metadata = MetadataSet::new();
    for (name, blob) in [("icc", input.icc), ("exif", input.exif), ("xmp", input.xmp)] {
        if let Some(blob) = blob {
            metadata.insert(name, blob);
        }
    }
    let mut frame = Frame::new(Vec::new(), input.width as u32, input.height as u32, 3)
        .with_metadata(metadata);

    let before = input.stream.clone();
    let (width, height) = (frame.width(), frame.height());
    if let Ok(out) = compose_metadata(base, width, height, &mut frame, input.strip) {
        let bytes = out.as_bytes();
        if bytes == &before[..] {
            return;
        }
        // anything rebuilt must describe its own length
        let declared = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        assert_eq!(declared, bytes.len() - 8);
        assert_eq!(&bytes[12..16], b"VP8X");
    }
});
