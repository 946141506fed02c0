//! Out-of-process raster tool.
//!
//! Images are exchanged as files in a scoped temporary directory; the
//! tool is invoked synchronously and its exit code decides success. The
//! geometry query reads back `width height colorspace depth` in a single
//! invocation.

use std::path::Path;
use std::process::Command;

use crate::error::{Error, Result};

/// Geometry and format of a raster file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterInfo {
    /// Pixel width
    pub width: u32,
    /// Pixel height
    pub height: u32,
    /// Colorspace name as reported by the tool
    pub colorspace: String,
    /// Bit depth per channel
    pub depth: u32,
}

/// Blocking out-of-process image converter.
pub trait Rasterizer {
    /// Convert `src` into `dst`, applying the given tool flags.
    fn convert(&self, src: &Path, flags: &[String], dst: &Path) -> Result<()>;

    /// Query geometry of an image file.
    fn identify(&self, path: &Path) -> Result<RasterInfo>;
}

/// ImageMagick-backed rasterizer (`convert` + `identify`).
#[derive(Debug, Clone)]
pub struct MagickRasterizer {
    convert_cmd: String,
    identify_cmd: String,
}

impl Default for MagickRasterizer {
    fn default() -> Self {
        MagickRasterizer {
            convert_cmd: "convert".to_string(),
            identify_cmd: "identify".to_string(),
        }
    }
}

impl MagickRasterizer {
    /// Use explicit tool names (e.g. `magick convert` wrappers).
    pub fn with_commands(convert_cmd: &str, identify_cmd: &str) -> Self {
        MagickRasterizer {
            convert_cmd: convert_cmd.to_string(),
            identify_cmd: identify_cmd.to_string(),
        }
    }
}

impl Rasterizer for MagickRasterizer {
    fn convert(&self, src: &Path, flags: &[String], dst: &Path) -> Result<()> {
        let mut command = Command::new(&self.convert_cmd);
        command.arg(src).args(flags).arg(dst);
        log::debug!("running {:?}", command);
        let status = command.status().map_err(|e| Error::ExternalTool {
            tool: self.convert_cmd.clone(),
            reason: e.to_string(),
        })?;
        if !status.success() {
            return Err(Error::ExternalTool {
                tool: self.convert_cmd.clone(),
                reason: format!("exit status {:?} converting {:?}", status.code(), src),
            });
        }
        Ok(())
    }

    fn identify(&self, path: &Path) -> Result<RasterInfo> {
        let output = Command::new(&self.identify_cmd)
            .arg("-format")
            .arg("%w %h %[colorspace] %z")
            .arg(path)
            .output()
            .map_err(|e| Error::ExternalTool {
                tool: self.identify_cmd.clone(),
                reason: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(Error::ExternalTool {
                tool: self.identify_cmd.clone(),
                reason: format!("exit status {:?} for {:?}", output.status.code(), path),
            });
        }
        let text = String::from_utf8_lossy(&output.stdout);
        parse_identify_output(text.trim()).ok_or_else(|| Error::ExternalTool {
            tool: self.identify_cmd.clone(),
            reason: format!("unparseable geometry {:?}", text),
        })
    }
}

fn parse_identify_output(text: &str) -> Option<RasterInfo> {
    let mut fields = text.split_whitespace();
    Some(RasterInfo {
        width: fields.next()?.parse().ok()?,
        height: fields.next()?.parse().ok()?,
        colorspace: fields.next()?.to_string(),
        depth: fields.next()?.parse().ok()?,
    })
}
