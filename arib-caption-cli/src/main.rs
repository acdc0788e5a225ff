//! Demo CLI: decode a fixture of ARIB/ABNT caption PES payloads and render
//! each decoded caption to PNG.
//!
//! This binary sits outside the core/render contract (see SPEC_FULL.md
//! §10); it exists to exercise `arib-caption-core` and `arib-caption-render`
//! end to end against a private fixture format: repeated records of
//! `pts: i64 LE`, `len: u32 LE`, `payload: [u8; len]`.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use clap::Parser;

use arib_caption_core::{CaptionType, Context, DecodeStatus, Decoder, EncodingScheme, Image, LanguageId, Profile};
use arib_caption_render::{NullFontProvider, NullTextRenderer, RenderStatus, Renderer};

#[derive(Parser)]
#[command(name = "arib-caption-cli")]
#[command(about = "Decodes a fixture of caption PES payloads and rasterizes each caption to PNG")]
#[command(version)]
struct Cli {
    /// Input fixture file.
    input: PathBuf,

    /// Output directory for rendered PNGs.
    #[arg(short, long, default_value = "out")]
    output: PathBuf,

    /// Caption plane width in the target video frame, in pixels.
    #[arg(long, default_value_t = 1920)]
    frame_width: i32,

    /// Caption plane height in the target video frame, in pixels.
    #[arg(long, default_value_t = 1080)]
    frame_height: i32,

    /// Caption stream type.
    #[arg(long, default_value = "caption")]
    caption_type: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let caption_type = match cli.caption_type.as_str() {
        "caption" => CaptionType::Caption,
        "superimpose" => CaptionType::Superimpose,
        other => bail!("unknown caption type: {other} (expected \"caption\" or \"superimpose\")"),
    };

    std::fs::create_dir_all(&cli.output).context("failed to create output directory")?;

    let mut decoder = Decoder::new(
        Context::new(),
        EncodingScheme::Auto,
        caption_type,
        Profile::ProfileA,
        LanguageId::First,
    );

    let mut renderer = Renderer::new(
        Context::new(),
        caption_type,
        Box::new(NullFontProvider),
        Box::new(NullTextRenderer),
    );
    renderer.set_frame_size(cli.frame_width, cli.frame_height);
    renderer.set_margins(0, 0, 0, 0);

    let file = File::open(&cli.input).context("failed to open input fixture")?;
    let mut reader = BufReader::new(file);

    let mut written = 0usize;
    loop {
        let pts = match reader.read_i64::<LittleEndian>() {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e).context("failed to read pts"),
        };
        let len = reader
            .read_u32::<LittleEndian>()
            .context("failed to read payload length")?;
        let mut payload = vec![0u8; len as usize];
        reader
            .read_exact(&mut payload)
            .context("failed to read payload")?;

        match decoder.decode(&payload, pts) {
            DecodeStatus::GotCaption(caption) => {
                renderer.append_caption(caption);
                let result = renderer.render(pts);
                if result.status == RenderStatus::GotImage {
                    for (i, image) in result.images.iter().enumerate() {
                        let path = cli.output.join(format!("caption_{pts}_{i}.png"));
                        write_png(&path, image)?;
                        written += 1;
                    }
                }
            }
            DecodeStatus::NoCaption => {}
            DecodeStatus::Error => eprintln!("decode error at pts {pts}"),
        }
    }

    println!("wrote {written} PNG(s) to {}", cli.output.display());
    Ok(())
}

fn write_png(path: &Path, img: &Image) -> Result<()> {
    let buffer = image::RgbaImage::from_fn(img.width as u32, img.height as u32, |x, y| {
        let row_start = y as usize * img.stride as usize;
        let i = row_start + x as usize * 4;
        image::Rgba([img.bitmap[i], img.bitmap[i + 1], img.bitmap[i + 2], img.bitmap[i + 3]])
    });
    buffer
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
