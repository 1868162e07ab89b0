//! sRGB colours as the debug panel and the materials see them.
//!
//! Colours are authored as `#rrggbb` hex strings in sRGB. The surface is an
//! sRGB format, so anything handed to the GPU (clear colour, flat material
//! uniforms) is converted to linear first and comes back out as the authored
//! hex value on screen.

use std::{fmt, str::FromStr};

use anyhow::{Context, bail};

/// An 8-bit-per-channel sRGB colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Srgb(pub [u8; 3]);

impl Srgb {
    pub const WHITE: Srgb = Srgb([0xff, 0xff, 0xff]);

    pub const fn from_hex(hex: u32) -> Self {
        Srgb([(hex >> 16) as u8, (hex >> 8) as u8, hex as u8])
    }

    /// Channels converted to linear light in `[0, 1]`.
    pub fn to_linear(self) -> [f32; 3] {
        self.0.map(|c| srgb_to_linear(c as f32 / 255.0))
    }

    /// Linear RGBA with full opacity, laid out for a `vec4<f32>` uniform.
    pub fn to_linear_rgba(self) -> [f32; 4] {
        let [r, g, b] = self.to_linear();
        [r, g, b, 1.0]
    }

    pub fn to_wgpu(self) -> wgpu::Color {
        let [r, g, b] = self.to_linear();
        wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: 1.0,
        }
    }
}

impl FromStr for Srgb {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('#').unwrap_or(s);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            bail!("expected a colour like #rrggbb, got {s:?}");
        }
        let hex = u32::from_str_radix(digits, 16)
            .with_context(|| format!("{s:?} is not a hex colour"))?;
        Ok(Srgb::from_hex(hex))
    }
}

impl fmt::Display for Srgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}
