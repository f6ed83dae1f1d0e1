//! Pluggable per-frame palette modifiers.
//!
//! Modifiers only see palettes registered with `allow_modifiers`, and always
//! start from freshly reset base data (see `PaletteManager::apply_modifiers`).

use ahash::AHashSet;

use crate::renderer::color::Color;
use crate::renderer::palette::ModifiablePalettes;

pub trait PaletteModifier {
    fn adjust_palettes(&self, palettes: &mut ModifiablePalettes<'_>);
}

/// Blends every modifiable palette toward a color, e.g. menu fades.
#[derive(Debug, Clone)]
pub struct FadeModifier {
    pub target: Color,
    /// 0 = untouched, 1 = fully `target`
    pub fraction: f32,
    pub excluded: AHashSet<String>,
}

impl FadeModifier {
    pub fn new(target: Color, fraction: f32) -> Self {
        Self {
            target,
            fraction,
            excluded: AHashSet::new(),
        }
    }

    pub fn excluding(mut self, name: &str) -> Self {
        self.excluded.insert(name.to_string());
        self
    }
}

impl PaletteModifier for FadeModifier {
    fn adjust_palettes(&self, palettes: &mut ModifiablePalettes<'_>) {
        if self.fraction <= 0.0 {
            return;
        }
        for (name, palette) in palettes.iter_mut() {
            if self.excluded.contains(name) {
                continue;
            }
            for entry in palette.colors_mut().iter_mut() {
                let color = Color::from_u32(*entry);
                *entry = color.lerp(self.target, self.fraction).to_u32();
            }
        }
    }
}

/// Multiplies the named palettes by a tint.
#[derive(Debug, Clone)]
pub struct TintModifier {
    pub palettes: Vec<String>,
    pub tint: Color,
}

impl TintModifier {
    pub fn new(palettes: impl IntoIterator<Item = impl Into<String>>, tint: Color) -> Self {
        Self {
            palettes: palettes.into_iter().map(Into::into).collect(),
            tint,
        }
    }
}

impl PaletteModifier for TintModifier {
    fn adjust_palettes(&self, palettes: &mut ModifiablePalettes<'_>) {
        for name in &self.palettes {
            let Some(palette) = palettes.get_mut(name) else {
                continue;
            };
            for entry in palette.colors_mut().iter_mut() {
                let c = Color::from_u32(*entry);
                *entry =
                    Color::rgba(c.r * self.tint.r, c.g * self.tint.g, c.b * self.tint.b, c.a)
                        .to_u32();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::palette::{Palette, PaletteManager};

    fn gray() -> Palette {
        Palette::from_fn(|_| Color::rgb(0.8, 0.8, 0.8).to_u32())
    }

    #[test]
    fn test_fade_skips_locked_palettes() {
        let mut palettes = PaletteManager::new();
        palettes.add_palette("terrain", gray(), true, false).unwrap();
        palettes.add_palette("chrome", gray(), false, false).unwrap();

        let fade = FadeModifier::new(Color::BLACK, 1.0);
        palettes.apply_modifiers(&[&fade]);

        assert_eq!(palettes.hardware_color("terrain", 3).unwrap(), Color::BLACK.to_u32());
        assert_eq!(palettes.hardware_color("chrome", 3).unwrap(), gray().get(3));
    }

    #[test]
    fn test_fade_exclusion() {
        let mut palettes = PaletteManager::new();
        palettes.add_palette("terrain", gray(), true, false).unwrap();
        palettes.add_palette("cursor", gray(), true, false).unwrap();

        let fade = FadeModifier::new(Color::BLACK, 1.0).excluding("cursor");
        palettes.apply_modifiers(&[&fade]);

        assert_eq!(palettes.hardware_color("cursor", 0).unwrap(), gray().get(0));
    }

    #[test]
    fn test_tint_only_named() {
        let mut palettes = PaletteManager::new();
        palettes.add_palette("a", gray(), true, false).unwrap();
        palettes.add_palette("b", gray(), true, false).unwrap();

        let tint = TintModifier::new(["a", "not-registered"], Color::rgb(1.0, 0.0, 0.0));
        palettes.apply_modifiers(&[&tint]);

        let a = Color::from_u32(palettes.hardware_color("a", 0).unwrap());
        assert!(a.g < 0.01 && a.r > 0.7);
        assert_eq!(palettes.hardware_color("b", 0).unwrap(), gray().get(0));
    }
}
