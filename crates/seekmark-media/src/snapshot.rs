// crates/seekmark-media/src/snapshot.rs
//
// Write the displayed frame to disk as PNG.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use tracing::info;

use seekmark_core::media_types::FrameImage;

use crate::error::MediaError;

pub fn save_png(image: &FrameImage, dest: &Path) -> Result<(), MediaError> {
    let file = File::create(dest)?;
    let w    = &mut BufWriter::new(file);
    let mut encoder = png::Encoder::new(w, image.width, image.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&image.data)?;
    info!(path = %dest.display(), "frame saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_decodable_png() {
        let dir  = tempfile::tempdir().unwrap();
        let dest = dir.path().join("frame.png");
        let image = FrameImage::solid(4, 3, [10, 20, 30, 255]);
        save_png(&image, &dest).unwrap();

        let decoder = png::Decoder::new(File::open(&dest).unwrap());
        let reader  = decoder.read_info().unwrap();
        let info    = reader.info();
        assert_eq!((info.width, info.height), (4, 3));
        assert_eq!(info.color_type, png::ColorType::Rgba);
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir  = tempfile::tempdir().unwrap();
        let dest = dir.path().join("no/such/dir/frame.png");
        let err  = save_png(&FrameImage::placeholder(), &dest).unwrap_err();
        assert!(matches!(err, MediaError::Io(_)));
    }
}
