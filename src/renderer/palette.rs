//! Named palettes and the composed hardware palette table.
//!
//! Every registered palette owns one 256-entry row of the hardware table.
//! The table height is the next power of two at or above the palette count;
//! growing it invalidates backend state built against the old height, so
//! subscribers are notified when that happens.

use ahash::AHashMap;
use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;

use crate::core::error::{RenderError, Result};
use crate::renderer::backend::RenderBackend;
use crate::renderer::color::Color;
use crate::renderer::modifiers::PaletteModifier;

/// Entries per palette.
pub const PALETTE_SIZE: usize = 256;

/// An indexed color table of packed RGBA8 entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    colors: Box<[u32; PALETTE_SIZE]>,
}

impl Palette {
    pub fn new(colors: [u32; PALETTE_SIZE]) -> Self {
        Self {
            colors: Box::new(colors),
        }
    }

    pub fn from_fn(mut f: impl FnMut(usize) -> u32) -> Self {
        let mut colors = [0u32; PALETTE_SIZE];
        for (i, entry) in colors.iter_mut().enumerate() {
            *entry = f(i);
        }
        Self::new(colors)
    }

    /// Build from a short color list; unused entries are transparent.
    pub fn from_colors(colors: &[Color]) -> Self {
        Self::from_fn(|i| colors.get(i).map(Color::to_u32).unwrap_or(0))
    }

    pub fn get(&self, index: u8) -> u32 {
        self.colors[index as usize]
    }

    pub fn set(&mut self, index: u8, packed: u32) {
        self.colors[index as usize] = packed;
    }

    pub fn colors(&self) -> &[u32; PALETTE_SIZE] {
        &self.colors
    }

    pub fn colors_mut(&mut self) -> &mut [u32; PALETTE_SIZE] {
        &mut self.colors
    }

    /// Copy with the entries in `range` recolored toward `tint`, keeping each
    /// entry's brightness. Used for player-color variants of a base palette.
    pub fn remapped(&self, range: Range<usize>, tint: Color) -> Palette {
        let mut out = self.clone();
        let end = range.end.min(PALETTE_SIZE);
        for entry in &mut out.colors[range.start.min(end)..end] {
            let original = Color::from_u32(*entry);
            let shade = original.luminance();
            let tinted = Color::rgba(tint.r * shade, tint.g * shade, tint.b * shade, original.a);
            *entry = tinted.to_u32();
        }
        out
    }
}

/// Cached handle to a named palette.
///
/// Shared by every drawable using the name. Replacing the palette updates the
/// handle in place, so holders see new data without resolving again.
#[derive(Debug)]
pub struct PaletteReference {
    name: String,
    index: usize,
    palette: RefCell<Rc<Palette>>,
}

impl PaletteReference {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Row of this palette in the hardware table.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current palette data.
    pub fn palette(&self) -> Rc<Palette> {
        self.palette.borrow().clone()
    }

    /// Normalized row center for shader lookups against a table of `height` rows.
    pub fn texture_mid_index(&self, height: usize) -> f32 {
        (self.index as f32 + 0.5) / height.max(1) as f32
    }

    fn replace(&self, palette: Rc<Palette>) {
        *self.palette.borrow_mut() = palette;
    }
}

/// Sent to subscribers whenever the hardware table height changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteInvalidated {
    pub height: usize,
}

struct PaletteSlot {
    name: String,
    base: Rc<Palette>,
    /// Working copy rebuilt from `base` every frame when modifiers are allowed.
    composed: Option<Palette>,
}

impl PaletteSlot {
    fn current(&self) -> &Palette {
        self.composed.as_ref().unwrap_or(&self.base)
    }
}

/// Mutable view over the modifiable palettes, handed to palette modifiers.
pub struct ModifiablePalettes<'a> {
    slots: &'a mut [PaletteSlot],
}

impl<'a> ModifiablePalettes<'a> {
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Palette> {
        self.slots
            .iter_mut()
            .find(|slot| slot.name == name)
            .and_then(|slot| slot.composed.as_mut())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Palette)> + '_ {
        self.slots.iter_mut().filter_map(|PaletteSlot { name, composed, .. }| {
            let name: &str = name;
            composed.as_mut().map(move |p| (name, p))
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.slots
            .iter()
            .filter(|slot| slot.composed.is_some())
            .map(|slot| slot.name.as_str())
    }
}

/// Owns every registered palette and the composed hardware table.
#[derive(Default)]
pub struct PaletteManager {
    slots: Vec<PaletteSlot>,
    indices: AHashMap<String, usize>,
    references: RefCell<AHashMap<String, Rc<PaletteReference>>>,
    buffer: Vec<u32>,
    height: usize,
    subscribers: Vec<flume::Sender<PaletteInvalidated>>,
}

impl PaletteManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows allocated in the hardware table.
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    /// Receive a message each time the table height changes.
    pub fn subscribe(&mut self) -> flume::Receiver<PaletteInvalidated> {
        let (tx, rx) = flume::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Register a palette under `name`.
    ///
    /// With `allow_overwrite` an existing name is replaced in place and keeps
    /// the row and modifier setting it was first registered with, so
    /// `allow_modifiers` only applies to new names. Without it, a duplicate
    /// name is an error.
    pub fn add_palette(
        &mut self,
        name: &str,
        palette: Palette,
        allow_modifiers: bool,
        allow_overwrite: bool,
    ) -> Result<()> {
        if self.indices.contains_key(name) {
            if allow_overwrite {
                return self.replace_palette(name, palette);
            }
            return Err(RenderError::DuplicatePalette(name.to_string()));
        }

        let old_height = self.height;
        let index = self.slots.len();
        let composed = allow_modifiers.then(|| palette.clone());
        self.slots.push(PaletteSlot {
            name: name.to_string(),
            base: Rc::new(palette),
            composed,
        });
        self.indices.insert(name.to_string(), index);

        if self.slots.len() > self.height {
            self.height = self.slots.len().next_power_of_two();
            self.buffer.resize(self.height * PALETTE_SIZE, 0);
            tracing::debug!("Grew palette table to {} rows", self.height);
        }
        self.copy_to_buffer(index);

        if self.height != old_height {
            self.notify_invalidated();
        }
        Ok(())
    }

    /// Overwrite the data of an existing palette, keeping its row.
    pub fn replace_palette(&mut self, name: &str, palette: Palette) -> Result<()> {
        let index = self.index_of(name)?;
        let base = Rc::new(palette);

        let slot = &mut self.slots[index];
        if slot.composed.is_some() {
            slot.composed = Some((*base).clone());
        }
        slot.base = base.clone();
        self.copy_to_buffer(index);

        if let Some(reference) = self.references.borrow().get(name) {
            reference.replace(base);
        }
        Ok(())
    }

    /// Cached reference for `name`, created on first use.
    pub fn resolve(&self, name: &str) -> Result<Rc<PaletteReference>> {
        if let Some(reference) = self.references.borrow().get(name) {
            return Ok(reference.clone());
        }

        let index = self.index_of(name)?;
        let reference = Rc::new(PaletteReference {
            name: name.to_string(),
            index,
            palette: RefCell::new(self.slots[index].base.clone()),
        });
        self.references
            .borrow_mut()
            .insert(name.to_string(), reference.clone());
        Ok(reference)
    }

    /// Base (unmodified) data for `name`.
    pub fn palette(&self, name: &str) -> Result<Rc<Palette>> {
        let index = self.index_of(name)?;
        Ok(self.slots[index].base.clone())
    }

    /// Rebuild every modifiable palette from its base data, then run the
    /// modifiers over it. Always starting from base data means applying the
    /// same modifiers twice in a frame gives the same table.
    pub fn apply_modifiers(&mut self, modifiers: &[&dyn PaletteModifier]) {
        for slot in &mut self.slots {
            if let Some(composed) = slot.composed.as_mut() {
                composed.clone_from(&slot.base);
            }
        }

        let mut view = ModifiablePalettes {
            slots: &mut self.slots,
        };
        for modifier in modifiers {
            modifier.adjust_palettes(&mut view);
        }

        for index in 0..self.slots.len() {
            if self.slots[index].composed.is_some() {
                self.copy_to_buffer(index);
            }
        }
    }

    /// Upload the composed table to the backend.
    pub fn commit(&self, backend: &mut dyn RenderBackend) -> Result<()> {
        backend.upload_palette(bytemuck::cast_slice(&self.buffer), self.height)
    }

    /// Per-frame refresh: compose modifiers, then upload.
    pub fn refresh(
        &mut self,
        modifiers: &[&dyn PaletteModifier],
        backend: &mut dyn RenderBackend,
    ) -> Result<()> {
        self.apply_modifiers(modifiers);
        self.commit(backend)
    }

    /// Entry of the composed table as last built.
    pub fn hardware_color(&self, name: &str, index: u8) -> Result<u32> {
        let row = self.index_of(name)?;
        Ok(self.buffer[row * PALETTE_SIZE + index as usize])
    }

    /// The composed table, one row per palette.
    pub fn hardware_table(&self) -> &[u32] {
        &self.buffer
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.indices
            .get(name)
            .copied()
            .ok_or_else(|| RenderError::UnknownPalette(name.to_string()))
    }

    fn copy_to_buffer(&mut self, index: usize) {
        let start = index * PALETTE_SIZE;
        let colors = self.slots[index].current().colors();
        self.buffer[start..start + PALETTE_SIZE].copy_from_slice(&colors[..]);
    }

    fn notify_invalidated(&mut self) {
        let event = PaletteInvalidated {
            height: self.height,
        };
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::modifiers::FadeModifier;

    fn solid(color: Color) -> Palette {
        Palette::from_fn(|_| color.to_u32())
    }

    #[test]
    fn test_height_grows_by_powers_of_two() {
        let mut palettes = PaletteManager::new();
        let heights: Vec<usize> = (0..5)
            .map(|i| {
                palettes
                    .add_palette(&format!("p{}", i), solid(Color::WHITE), false, false)
                    .unwrap();
                palettes.height()
            })
            .collect();
        assert_eq!(heights, vec![1, 2, 4, 4, 8]);
        assert_eq!(palettes.hardware_table().len(), 8 * PALETTE_SIZE);
    }

    #[test]
    fn test_duplicate_without_overwrite_fails() {
        let mut palettes = PaletteManager::new();
        palettes.add_palette("terrain", solid(Color::WHITE), false, false).unwrap();
        let result = palettes.add_palette("terrain", solid(Color::BLACK), false, false);
        assert!(matches!(result, Err(RenderError::DuplicatePalette(name)) if name == "terrain"));
    }

    #[test]
    fn test_overwrite_keeps_row() {
        let mut palettes = PaletteManager::new();
        palettes.add_palette("a", solid(Color::WHITE), false, false).unwrap();
        palettes.add_palette("b", solid(Color::WHITE), false, false).unwrap();
        palettes.add_palette("a", solid(Color::RED), false, true).unwrap();

        assert_eq!(palettes.len(), 2);
        assert_eq!(palettes.resolve("a").unwrap().index(), 0);
        assert_eq!(palettes.hardware_color("a", 9).unwrap(), Color::RED.to_u32());
    }

    #[test]
    fn test_overwrite_keeps_modifier_setting() {
        let mut palettes = PaletteManager::new();
        palettes.add_palette("ui", solid(Color::WHITE), false, false).unwrap();
        palettes.add_palette("ui", solid(Color::RED), true, true).unwrap();

        let fade: &dyn PaletteModifier = &FadeModifier::new(Color::BLACK, 1.0);
        palettes.apply_modifiers(&[fade]);
        assert_eq!(palettes.hardware_color("ui", 0).unwrap(), Color::RED.to_u32());
    }

    #[test]
    fn test_resolve_unknown() {
        let palettes = PaletteManager::new();
        assert!(matches!(
            palettes.resolve("missing"),
            Err(RenderError::UnknownPalette(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_texture_mid_index() {
        let mut palettes = PaletteManager::new();
        for name in ["a", "b", "c"] {
            palettes.add_palette(name, solid(Color::WHITE), false, false).unwrap();
        }
        let reference = palettes.resolve("c").unwrap();
        assert!((reference.texture_mid_index(palettes.height()) - 2.5 / 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_remapped_only_touches_range() {
        let base = solid(Color::WHITE);
        let red = base.remapped(80..96, Color::RED);
        assert_eq!(red.get(79), Color::WHITE.to_u32());
        assert_eq!(red.get(80), Color::RED.to_u32());
        assert_eq!(red.get(95), Color::RED.to_u32());
        assert_eq!(red.get(96), Color::WHITE.to_u32());
    }
}
