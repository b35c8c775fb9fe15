use std::fmt;

/// RGB color as picked in the UI; sRGB-encoded components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color::from_hex(0xffffff);
    pub const BLACK: Color = Color::from_hex(0x000000);
    pub const RED: Color = Color::from_hex(0xff0000);
    pub const YELLOW: Color = Color::from_hex(0xffff00);
    pub const ORANGE: Color = Color::from_hex(0xffa500);
    pub const SKY_BLUE: Color = Color::from_hex(0x87ceeb);
    pub const HOT_PINK: Color = Color::from_hex(0xff69b4);
    pub const GREEN: Color = Color::from_hex(0x00ff00);

    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as f32 / 255.0,
            g: ((hex >> 8) & 0xff) as f32 / 255.0,
            b: (hex & 0xff) as f32 / 255.0,
        }
    }

    /// Parse `#rrggbb` (the format produced by color pickers).
    pub fn parse_hex(s: &str) -> Option<Self> {
        let digits = s.strip_prefix('#').unwrap_or(s);
        if digits.len() != 6 {
            return None;
        }
        u32::from_str_radix(digits, 16).ok().map(Self::from_hex)
    }

    pub fn to_hex(self) -> u32 {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
        (c(self.r) << 16) | (c(self.g) << 8) | c(self.b)
    }

    pub fn to_rgba(self, alpha: f32) -> [f32; 4] {
        [self.r, self.g, self.b, alpha]
    }

    pub fn to_srgb8(self) -> [u8; 3] {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [c(self.r), c(self.g), c(self.b)]
    }

    pub fn from_srgb8([r, g, b]: [u8; 3]) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.to_hex())
    }
}

/// Identifier of a texture image resolved by the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureRef(pub String);

/// Everything the renderer needs to shade one mesh part.
///
/// Defaults mirror a plain "standard" surface: white, not metallic,
/// fully rough, opaque, no emission.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDescriptor {
    pub color: Color,
    pub emissive: Color,
    pub emissive_intensity: f32,
    pub metalness: f32,
    pub roughness: f32,
    pub opacity: f32,
    pub transparent: bool,
    pub texture: Option<TextureRef>,
}

impl Default for MaterialDescriptor {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            emissive: Color::BLACK,
            emissive_intensity: 1.0,
            metalness: 0.0,
            roughness: 1.0,
            opacity: 1.0,
            transparent: false,
            texture: None,
        }
    }
}

impl MaterialDescriptor {
    pub fn standard(color: Color) -> Self {
        Self { color, ..Self::default() }
    }

    pub fn with_emissive(mut self, emissive: Color, intensity: f32) -> Self {
        self.emissive = emissive;
        self.emissive_intensity = intensity;
        self
    }

    pub fn with_metal(mut self, metalness: f32, roughness: f32) -> Self {
        self.metalness = metalness;
        self.roughness = roughness;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.transparent = true;
        self.opacity = opacity;
        self
    }

    pub fn with_texture(mut self, texture: TextureRef) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn is_emissive(&self) -> bool {
        self.emissive != Color::BLACK
    }
}

/// Inputs from the configuration that variants are parameterized by.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialInputs<'a> {
    /// User-picked surface color; `None` keeps the part's own color.
    pub color: Option<Color>,
    /// Texture to apply when texturing is switched on.
    pub texture: Option<&'a TextureRef>,
    /// The "emit" toggle of variants that support it.
    pub emissive: bool,
}

/// Closed set of material presets across all demos. Each demo allows a subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialVariant {
    Standard,
    Emissive,
    Transparent,
    Realistic,
    Gold,
    Glass,
    Chrome,
    Glow,
    Original,
    Alternative,
}

impl MaterialVariant {
    pub const ALL: [MaterialVariant; 10] = [
        MaterialVariant::Standard,
        MaterialVariant::Emissive,
        MaterialVariant::Transparent,
        MaterialVariant::Realistic,
        MaterialVariant::Gold,
        MaterialVariant::Glass,
        MaterialVariant::Chrome,
        MaterialVariant::Glow,
        MaterialVariant::Original,
        MaterialVariant::Alternative,
    ];

    pub fn key(self) -> &'static str {
        match self {
            MaterialVariant::Standard => "standard",
            MaterialVariant::Emissive => "emissive",
            MaterialVariant::Transparent => "transparent",
            MaterialVariant::Realistic => "realistic",
            MaterialVariant::Gold => "gold",
            MaterialVariant::Glass => "glass",
            MaterialVariant::Chrome => "chrome",
            MaterialVariant::Glow => "glow",
            MaterialVariant::Original => "original",
            MaterialVariant::Alternative => "alternative",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MaterialVariant::Standard => "Standard",
            MaterialVariant::Emissive => "Emissive",
            MaterialVariant::Transparent => "Transparent",
            MaterialVariant::Realistic => "Realistic",
            MaterialVariant::Gold => "Gold",
            MaterialVariant::Glass => "Glass",
            MaterialVariant::Chrome => "Chrome",
            MaterialVariant::Glow => "Glow",
            MaterialVariant::Original => "Original",
            MaterialVariant::Alternative => "Alternative",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.key() == key)
    }

    /// Build the complete material for one mesh part.
    ///
    /// The result is always derived from `base` and `inputs` alone, so
    /// switching away from a variant and back yields an identical descriptor.
    pub fn resolve(self, base: &MaterialDescriptor, inputs: &MaterialInputs<'_>) -> MaterialDescriptor {
        let color = inputs.color.unwrap_or(base.color);
        match self {
            MaterialVariant::Standard => {
                let mut m = MaterialDescriptor::standard(color);
                if let Some(texture) = inputs.texture {
                    m.color = Color::WHITE;
                    m.texture = Some(texture.clone());
                }
                if inputs.emissive {
                    m = m.with_emissive(Color::YELLOW, 0.6);
                }
                m
            }
            MaterialVariant::Emissive => MaterialDescriptor::standard(color).with_emissive(Color::YELLOW, 0.6),
            MaterialVariant::Transparent => MaterialDescriptor::standard(color).with_opacity(0.5),
            MaterialVariant::Gold => MaterialDescriptor::standard(Color::from_hex(0xffd700)).with_metal(1.0, 0.3),
            MaterialVariant::Glass => MaterialDescriptor::standard(Color::from_hex(0x88ccee)).with_opacity(0.5),
            MaterialVariant::Chrome => MaterialDescriptor::standard(Color::WHITE).with_metal(1.0, 0.05),
            MaterialVariant::Glow => {
                MaterialDescriptor::standard(Color::WHITE).with_emissive(Color::from_hex(0x44ffff), 1.0)
            }
            MaterialVariant::Original | MaterialVariant::Realistic => base.clone(),
            MaterialVariant::Alternative => MaterialDescriptor::standard(Color::from_hex(0xff00ff))
                .with_metal(0.3, 1.0)
                .with_opacity(0.7),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip_of_picker_values() {
        let c = Color::parse_hex("#ff8000").unwrap();
        assert_eq!(c.to_hex(), 0xff8000);
        assert_eq!(c.to_string(), "#ff8000");
        assert!(Color::parse_hex("#fff").is_none());
        assert!(Color::parse_hex("zzzzzz").is_none());
    }

    #[test]
    fn test_emissive_then_standard_leaves_no_residue() {
        let base = MaterialDescriptor::standard(Color::RED);
        let inputs = MaterialInputs { color: Some(Color::RED), ..Default::default() };

        let standard = MaterialVariant::Standard.resolve(&base, &inputs);
        let emissive = MaterialVariant::Emissive.resolve(&base, &inputs);
        assert!(emissive.is_emissive());
        assert_eq!(emissive.emissive_intensity, 0.6);

        let back = MaterialVariant::Standard.resolve(&base, &inputs);
        assert_eq!(back, standard);
        assert!(!back.is_emissive());
        assert_eq!(back.emissive_intensity, 1.0);
    }

    #[test]
    fn test_texture_whitens_base_color() {
        let base = MaterialDescriptor::standard(Color::ORANGE);
        let tex = TextureRef("texture.jpg".into());
        let inputs = MaterialInputs { texture: Some(&tex), ..Default::default() };
        let m = MaterialVariant::Standard.resolve(&base, &inputs);
        assert_eq!(m.color, Color::WHITE);
        assert_eq!(m.texture, Some(tex));

        let plain = MaterialVariant::Standard.resolve(&base, &MaterialInputs::default());
        assert_eq!(plain.color, Color::ORANGE);
        assert_eq!(plain.texture, None);
    }

    #[test]
    fn test_original_restores_part_material() {
        let base = MaterialDescriptor::standard(Color::SKY_BLUE).with_metal(0.4, 0.6);
        let alt = MaterialVariant::Alternative.resolve(&base, &MaterialInputs::default());
        assert!(alt.transparent);
        assert_eq!(alt.opacity, 0.7);
        assert_eq!(MaterialVariant::Original.resolve(&base, &MaterialInputs::default()), base);
    }

    #[test]
    fn test_variant_keys_are_unique() {
        for v in MaterialVariant::ALL {
            assert_eq!(MaterialVariant::from_key(v.key()), Some(v));
        }
    }
}
