use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::presenter::RgbaImage;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("png encoding failed: {0}")]
    Encoding(#[from] png::EncodingError),
}

pub fn encode_png<W: Write>(w: W, image: &RgbaImage) -> Result<(), ExportError> {
    let mut encoder = png::Encoder::new(w, image.width as u32, image.height as u32);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_source_gamma(png::ScaledFloat::new(1.0 / 2.2));
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&image.pixels)?;
    writer.finish()?;
    Ok(())
}

/// Writes numbered frames `<prefix>-<frame>.png` into one directory.
pub struct FrameExporter {
    directory: PathBuf,
    prefix: String,
}

impl FrameExporter {
    pub fn new(directory: &Path, prefix: &str) -> Result<FrameExporter, ExportError> {
        std::fs::create_dir_all(directory).map_err(|source| ExportError::Io {
            path: directory.to_path_buf(),
            source,
        })?;
        Ok(FrameExporter {
            directory: directory.to_path_buf(),
            prefix: prefix.to_string(),
        })
    }

    pub fn frame_path(&self, frame: usize) -> PathBuf {
        self.directory.join(format!("{}-{:05}.png", self.prefix, frame))
    }

    pub fn write(&self, frame: usize, image: &RgbaImage) -> Result<PathBuf, ExportError> {
        let path = self.frame_path(frame);
        let file = File::create(&path).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;
        encode_png(BufWriter::new(file), image)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::{encode_png, FrameExporter};
    use crate::presenter::RgbaImage;

    fn image() -> RgbaImage {
        RgbaImage {
            width: 2,
            height: 1,
            pixels: vec![255, 0, 0, 255, 0, 0, 0, 255],
        }
    }

    #[test]
    fn encoded_png_decodes_to_same_pixels() {
        let mut bytes = Vec::new();
        encode_png(&mut bytes, &image()).unwrap();

        let decoder = png::Decoder::new(&bytes[..]);
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();
        assert_eq!((info.width, info.height), (2, 1));
        assert_eq!(&buf[..info.buffer_size()], &image().pixels[..]);
    }

    #[test]
    fn pixel_count_mismatch_is_an_error() {
        let mut broken = image();
        broken.pixels.pop();
        assert!(encode_png(Vec::new(), &broken).is_err());
    }

    #[test]
    fn frames_are_numbered() {
        let dir = std::env::temp_dir().join(format!("ink-fluid-export-{}", std::process::id()));
        let exporter = FrameExporter::new(&dir, "ink").unwrap();
        let path = exporter.write(7, &image()).unwrap();
        assert!(path.ends_with("ink-00007.png"));
        assert!(path.exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
