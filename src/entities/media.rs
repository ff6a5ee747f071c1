//! Media descriptors and the decode pipeline feeding the media cache.
//!
//! Pipeline: probe the header to learn the format, reopen the stream, decode.
//! - GIF: every frame becomes a full RGBA composite (previous composite with
//!   the new frame drawn over it). Disposal methods are ignored on purpose,
//!   draw-over is the defined behavior for every frame.
//! - Everything else: single frame, downscaled with nearest-neighbour when a
//!   side exceeds [`MAX_SIDE`].

use image::imageops::{self, FilterType};
use image::{GenericImageView, ImageFormat, ImageReader, RgbaImage};
use log::{debug, trace};
use std::io::BufReader;
use std::path::Path;

use super::storage::{MediaStream, Storage};

/// Longest side allowed for static images before downscaling
pub const MAX_SIDE: u32 = 1024;

/// Delay (1/100 s) substituted for zero-delay GIF frames
pub const DEFAULT_GIF_DELAY: u16 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Static,
    Animated,
}

/// Decoded media: one frame for stills, composited frames + delays for animations
#[derive(Debug, Clone)]
pub struct MediaDescriptor {
    pub kind: MediaKind,
    pub frames: Vec<RgbaImage>,
    /// Per-frame delay in 1/100 s, parallel to `frames` (empty for stills)
    pub delays: Vec<u16>,
}

impl MediaDescriptor {
    pub fn is_animated(&self) -> bool {
        self.kind == MediaKind::Animated
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// (width, height) of the first frame
    pub fn dimensions(&self) -> (u32, u32) {
        self.frames.first().map(|f| f.dimensions()).unwrap_or((0, 0))
    }

    /// Approximate memory footprint in bytes
    pub fn mem(&self) -> usize {
        self.frames.iter().map(|f| f.as_raw().len()).sum::<usize>() + self.delays.len() * 2
    }
}

/// Media cache failure
#[derive(Debug)]
pub enum CacheError {
    /// Open / stat / read failure
    Io(std::io::Error),
    /// File exceeds the configured size cap
    TooLarge { size_mb: u64, limit_mb: u64 },
    /// Unsupported or corrupt media
    Decode(String),
    /// Decode failed earlier; replayed from the cache without retrying
    InvalidCachedEntry { uri: String, reason: String },
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Io(e) => write!(f, "I/O error: {}", e),
            CacheError::TooLarge { size_mb, limit_mb } => {
                write!(f, "file too large: {} MB (limit {} MB)", size_mb, limit_mb)
            }
            CacheError::Decode(e) => write!(f, "decode error: {}", e),
            CacheError::InvalidCachedEntry { uri, reason } => {
                write!(f, "invalid file {} ({})", uri, reason)
            }
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        CacheError::Io(e)
    }
}

impl From<image::ImageError> for CacheError {
    fn from(e: image::ImageError) -> Self {
        CacheError::Decode(e.to_string())
    }
}

impl From<gif::DecodingError> for CacheError {
    fn from(e: gif::DecodingError) -> Self {
        CacheError::Decode(format!("gif: {}", e))
    }
}

/// Decode `path` from `storage` into a descriptor.
pub fn decode_media<S: Storage + ?Sized>(storage: &S, path: &Path) -> Result<MediaDescriptor, CacheError> {
    let format = probe(storage.open(path)?)?;
    trace!("{} probed as {:?}", path.display(), format);

    // Probing consumed part of the stream, reopening is simpler than rewinding
    let stream = storage.open(path)?;
    match format {
        ImageFormat::Gif => decode_gif(stream),
        other => decode_static(stream, other),
    }
}

/// Header-only decode: format plus dimensions, no pixel data
fn probe(stream: Box<dyn MediaStream>) -> Result<ImageFormat, CacheError> {
    let reader = ImageReader::new(BufReader::new(stream)).with_guessed_format()?;
    let format = reader
        .format()
        .ok_or_else(|| CacheError::Decode("unknown image format".to_string()))?;
    reader.into_dimensions()?;
    Ok(format)
}

fn decode_static(stream: Box<dyn MediaStream>, format: ImageFormat) -> Result<MediaDescriptor, CacheError> {
    let mut img = ImageReader::with_format(BufReader::new(stream), format).decode()?;

    let (width, height) = img.dimensions();
    if width > MAX_SIDE || height > MAX_SIDE {
        let (new_w, new_h) = fit_within(width, height, MAX_SIDE);
        debug!("Downscaling {}x{} -> {}x{}", width, height, new_w, new_h);
        img = img.resize_exact(new_w, new_h, FilterType::Nearest);
    }

    Ok(MediaDescriptor {
        kind: MediaKind::Static,
        frames: vec![img.into_rgba8()],
        delays: Vec::new(),
    })
}

fn decode_gif(stream: Box<dyn MediaStream>) -> Result<MediaDescriptor, CacheError> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = options.read_info(BufReader::new(stream))?;

    let screen = (u32::from(decoder.width()), u32::from(decoder.height()));
    let mut last: Option<RgbaImage> = None;
    let mut frames = Vec::new();
    let mut delays = Vec::new();

    while let Some(frame) = decoder.read_next_frame()? {
        let (fw, fh) = (u32::from(frame.width), u32::from(frame.height));
        let patch = RgbaImage::from_raw(fw, fh, frame.buffer.to_vec())
            .ok_or_else(|| CacheError::Decode("gif: truncated frame buffer".to_string()))?;

        let mut current = match last.take() {
            Some(prev) => prev,
            None => {
                // Degenerate logical screen: size the canvas from the first frame
                let (w, h) = if screen.0 == 0 || screen.1 == 0 {
                    (u32::from(frame.left) + fw, u32::from(frame.top) + fh)
                } else {
                    screen
                };
                RgbaImage::new(w.max(1), h.max(1))
            }
        };
        imageops::overlay(&mut current, &patch, i64::from(frame.left), i64::from(frame.top));

        delays.push(if frame.delay < 1 { DEFAULT_GIF_DELAY } else { frame.delay });
        frames.push(current.clone());
        last = Some(current);
    }

    if frames.is_empty() {
        return Err(CacheError::Decode("gif: no frames".to_string()));
    }

    Ok(MediaDescriptor {
        kind: MediaKind::Animated,
        frames,
        delays,
    })
}

/// Scale (width, height) so the longest side is exactly `max_side`.
pub fn fit_within(width: u32, height: u32, max_side: u32) -> (u32, u32) {
    let (w, h, max) = (width as f64, height as f64, max_side as f64);
    let (new_w, new_h) = if width > height {
        (max_side, (h / w * max) as u32)
    } else {
        ((w / h * max) as u32, max_side)
    };
    (new_w.max(1), new_h.max(1))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::entities::storage::FsStorage;
    use image::Rgba;
    use std::fs::File;
    use std::path::PathBuf;

    pub(crate) fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        path
    }

    /// Frames as (width, height, left, top, delay, rgba)
    pub(crate) fn write_gif(
        dir: &Path,
        name: &str,
        screen: (u16, u16),
        frames: &[(u16, u16, u16, u16, u16, [u8; 4])],
    ) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        let mut encoder = gif::Encoder::new(&mut file, screen.0, screen.1, &[]).unwrap();
        for &(w, h, left, top, delay, color) in frames {
            let mut rgba: Vec<u8> = color.iter().copied().cycle().take(w as usize * h as usize * 4).collect();
            let mut frame = gif::Frame::from_rgba_speed(w, h, &mut rgba, 10);
            frame.left = left;
            frame.top = top;
            frame.delay = delay;
            encoder.write_frame(&frame).unwrap();
        }
        path
    }

    #[test]
    fn test_fit_within() {
        assert_eq!(fit_within(2048, 1024, 1024), (1024, 512));
        assert_eq!(fit_within(500, 3000, 1024), (170, 1024));
        assert_eq!(fit_within(2000, 2000, 1024), (1024, 1024));
    }

    #[test]
    fn test_static_downscale() {
        let dir = tempfile::tempdir().unwrap();
        let big = write_png(dir.path(), "big.png", 2048, 1024);
        let small = write_png(dir.path(), "small.png", 300, 200);

        let desc = decode_media(&FsStorage, &big).unwrap();
        assert_eq!(desc.kind, MediaKind::Static);
        assert_eq!(desc.dimensions(), (1024, 512));
        assert!(desc.delays.is_empty());

        let desc = decode_media(&FsStorage, &small).unwrap();
        assert_eq!(desc.dimensions(), (300, 200));
    }

    #[test]
    fn test_gif_delays_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let red = [255, 0, 0, 255];
        let path = write_gif(dir.path(), "anim.gif", (4, 4), &[(4, 4, 0, 0, 0, red), (4, 4, 0, 0, 5, red)]);

        let desc = decode_media(&FsStorage, &path).unwrap();
        assert!(desc.is_animated());
        assert_eq!(desc.delays, vec![10, 5]);
        assert_eq!(desc.frame_count(), 2);
    }

    #[test]
    fn test_gif_draw_over_compositing() {
        let dir = tempfile::tempdir().unwrap();
        let red = [255, 0, 0, 255];
        let blue = [0, 0, 255, 255];
        let path = write_gif(
            dir.path(),
            "patch.gif",
            (4, 4),
            &[(4, 4, 0, 0, 10, red), (2, 2, 2, 2, 10, blue)],
        );

        let desc = decode_media(&FsStorage, &path).unwrap();
        let second = &desc.frames[1];
        assert_eq!(second.dimensions(), (4, 4));
        assert_eq!(second.get_pixel(0, 0), &Rgba(red));
        assert_eq!(second.get_pixel(3, 3), &Rgba(blue));
        // first composite untouched by the later patch
        assert_eq!(desc.frames[0].get_pixel(3, 3), &Rgba(red));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.png");
        std::fs::write(&path, b"definitely not an image").unwrap();

        match decode_media(&FsStorage, &path) {
            Err(CacheError::Decode(_)) => {}
            other => panic!("expected decode error, got {:?}", other.map(|d| d.kind)),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = decode_media(&FsStorage, &dir.path().join("nope.png")).unwrap_err();
        assert!(matches!(err, CacheError::Io(_)));
    }
}
