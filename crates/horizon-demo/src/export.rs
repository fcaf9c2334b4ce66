//! PNG export of layer previews.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use horizon_streaming::{ChunkCoord, ChunkLayers};
use horizon_terrain::preview::{PreviewImage, render_heat, render_height, render_moisture};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: png::EncodingError,
    },
}

/// Write `image` as an 8-bit RGBA PNG.
pub fn write_png(image: &PreviewImage, path: &Path) -> Result<(), ExportError> {
    let io_err = |source: std::io::Error| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let encode_err = |source: png::EncodingError| ExportError::Encode {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_err)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), image.width, image.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().map_err(encode_err)?;
    writer.write_image_data(&image.pixels).map_err(encode_err)?;
    writer.finish().map_err(encode_err)?;
    Ok(())
}

/// Write height, heat and moisture previews of one chunk into `dir`.
/// Returns the written paths.
pub fn export_layers(
    dir: &Path,
    coord: ChunkCoord,
    layers: &ChunkLayers,
) -> Result<Vec<PathBuf>, ExportError> {
    std::fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let images = [
        ("height", render_height(&layers.height)),
        ("heat", render_heat(&layers.heat)),
        ("moisture", render_moisture(&layers.moisture)),
    ];

    let mut written = Vec::with_capacity(images.len());
    for (name, image) in &images {
        let path = dir.join(format!("chunk_{}_{}_{name}.png", coord.x, coord.y));
        write_png(image, &path)?;
        written.push(path);
    }
    Ok(written)
}
