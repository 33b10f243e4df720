use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt::{self, Display};

/// RGB 颜色常量，通道为 0..=255 的整数，alpha 为 0..=1。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantColor {
    red: u8,
    green: u8,
    blue: u8,
    alpha: f64,
}

/// HSL 表示：hue 以角度计，范围 [0, 360)；saturation 与 lightness 为 [0, 1]。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub hue: f64,
    pub saturation: f64,
    pub lightness: f64,
}

static FUNCTIONAL_NOTATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(rgba?|hsla?)\(\s*([^,\s]+)\s*,\s*([^,\s]+)\s*,\s*([^,\s\)]+)\s*(?:,\s*([^,\s\)]+)\s*)?\)$",
    )
    .expect("颜色函数正则必须合法")
});

static KEYWORDS: Lazy<HashMap<&'static str, u32>> =
    Lazy::new(|| NAMED_COLORS.iter().copied().collect());

impl ConstantColor {
    pub fn new(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha: 1.0,
        }
    }

    /// 由 `0xRRGGBB` 形式的整数构造。
    pub fn from_rgb(value: u32) -> Self {
        Self::new(
            ((value >> 16) & 0xff) as u8,
            ((value >> 8) & 0xff) as u8,
            (value & 0xff) as u8,
        )
    }

    pub fn with_alpha(self, alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            ..self
        }
    }

    pub fn red(&self) -> u8 {
        self.red
    }

    pub fn green(&self) -> u8 {
        self.green
    }

    pub fn blue(&self) -> u8 {
        self.blue
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn channels(&self) -> [f64; 3] {
        [self.red as f64, self.green as f64, self.blue as f64]
    }

    /// 识别 `#rgb`、`#rrggbb`、`#rrggbbaa`、颜色关键字以及 rgb()/rgba()/hsl()/hsla()。
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if let Some(stripped) = trimmed.strip_prefix('#') {
            return parse_hex(stripped);
        }
        if let Some(color) = Self::keyword(trimmed) {
            return Some(color);
        }
        parse_functional(trimmed)
    }

    /// 按 CSS 颜色关键字查找，大小写不敏感。
    pub fn keyword(name: &str) -> Option<Self> {
        let lowered = name.to_ascii_lowercase();
        if lowered == "transparent" {
            return Some(Self::new(0, 0, 0).with_alpha(0.0));
        }
        KEYWORDS.get(lowered.as_str()).map(|rgb| Self::from_rgb(*rgb))
    }

    /// 按 rgb() 语义构造：百分比分量换算到 255，数值分量截断后夹紧。
    pub fn from_rgb_components(components: [(f64, bool); 3], alpha: (f64, bool)) -> Self {
        let [r, g, b] = components.map(|(value, percent)| rgb_channel(value, percent));
        Self::new(r, g, b).with_alpha(alpha_value(alpha.0, alpha.1))
    }

    /// 按 hsl() 语义构造：hue 取模 360，饱和度与亮度是 0..100 的百分数。
    pub fn from_hsl_components(hue: f64, saturation: f64, lightness: f64, alpha: f64) -> Self {
        Self::from_hsl(
            Hsl {
                hue,
                saturation: saturation.clamp(0.0, 100.0) / 100.0,
                lightness: lightness.clamp(0.0, 100.0) / 100.0,
            },
            alpha,
        )
    }

    pub fn from_hsl(hsl: Hsl, alpha: f64) -> Self {
        let hue = hsl.hue.rem_euclid(360.0) / 360.0;
        let s = hsl.saturation.clamp(0.0, 1.0);
        let l = hsl.lightness.clamp(0.0, 1.0);
        let [r, g, b] = hsl_to_rgb(hue, s, l);
        Self::new(to_channel(r), to_channel(g), to_channel(b)).with_alpha(alpha)
    }

    pub fn to_hsl(&self) -> Hsl {
        let [r, g, b] = self.channels().map(|channel| channel / 255.0);
        let (h, s, l) = rgb_to_hsl(r, g, b);
        Hsl {
            hue: h * 360.0,
            saturation: s,
            lightness: l,
        }
    }

    /// 逐通道运算，结果截断取整并夹紧到 [0, 255]，alpha 保持不变。
    pub fn combine<F>(&self, operands: [f64; 3], op: F) -> Self
    where
        F: Fn(f64, f64) -> f64,
    {
        let [r, g, b] = self.channels();
        Self {
            red: clamp_channel(op(r, operands[0]).trunc()),
            green: clamp_channel(op(g, operands[1]).trunc()),
            blue: clamp_channel(op(b, operands[2]).trunc()),
            alpha: self.alpha,
        }
    }

    pub fn fade(self, amount: f64) -> Self {
        self.with_alpha(amount)
    }

    pub fn overlay(self, other: ConstantColor) -> Self {
        color_blend(blend_overlay, self, other)
    }

    /// `#aarrggbb` 形式，alpha 在最前。
    pub fn to_argb(&self) -> String {
        format!(
            "#{:02x}{:02x}{:02x}{:02x}",
            to_channel(self.alpha),
            self.red,
            self.green,
            self.blue
        )
    }
}

impl Display for ConstantColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.alpha < 1.0 {
            return write!(
                f,
                "rgba({}, {}, {}, {})",
                self.red,
                self.green,
                self.blue,
                format_float(self.alpha)
            );
        }
        let doubled = [self.red, self.green, self.blue]
            .iter()
            .all(|channel| channel >> 4 == channel & 0x0f);
        if doubled {
            write!(
                f,
                "#{:x}{:x}{:x}",
                self.red & 0x0f,
                self.green & 0x0f,
                self.blue & 0x0f
            )
        } else {
            write!(f, "#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
        }
    }
}

fn parse_hex(hex: &str) -> Option<ConstantColor> {
    if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        3 => {
            let r = hex_value(&hex[0..1])?;
            let g = hex_value(&hex[1..2])?;
            let b = hex_value(&hex[2..3])?;
            Some(ConstantColor::new(r * 17, g * 17, b * 17))
        }
        6 => {
            let r = hex_value(&hex[0..2])?;
            let g = hex_value(&hex[2..4])?;
            let b = hex_value(&hex[4..6])?;
            Some(ConstantColor::new(r, g, b))
        }
        8 => {
            let r = hex_value(&hex[0..2])?;
            let g = hex_value(&hex[2..4])?;
            let b = hex_value(&hex[4..6])?;
            let a = hex_value(&hex[6..8])?;
            Some(ConstantColor::new(r, g, b).with_alpha(a as f64 / 255.0))
        }
        _ => None,
    }
}

fn parse_functional(input: &str) -> Option<ConstantColor> {
    let captures = FUNCTIONAL_NOTATION.captures(input)?;
    let name = captures.get(1)?.as_str().to_ascii_lowercase();
    let first = parse_component(captures.get(2)?.as_str())?;
    let second = parse_component(captures.get(3)?.as_str())?;
    let third = parse_component(captures.get(4)?.as_str())?;
    let alpha = match captures.get(5) {
        Some(raw) => parse_component(raw.as_str())?,
        None => (1.0, false),
    };
    if name.starts_with("rgb") {
        Some(ConstantColor::from_rgb_components(
            [first, second, third],
            alpha,
        ))
    } else {
        Some(ConstantColor::from_hsl_components(
            first.0,
            second.0,
            third.0,
            alpha_value(alpha.0, alpha.1),
        ))
    }
}

fn parse_component(input: &str) -> Option<(f64, bool)> {
    match input.strip_suffix('%') {
        Some(value) => value.parse().ok().map(|v| (v, true)),
        None => input.parse().ok().map(|v| (v, false)),
    }
}

pub(crate) fn rgb_channel(value: f64, percent: bool) -> u8 {
    let raw = if percent { value * 255.0 / 100.0 } else { value };
    clamp_channel(raw.trunc())
}

pub(crate) fn alpha_value(value: f64, percent: bool) -> f64 {
    let raw = if percent { value / 100.0 } else { value };
    raw.clamp(0.0, 1.0)
}

fn clamp_channel(value: f64) -> u8 {
    value.clamp(0.0, 255.0) as u8
}

fn color_blend<F>(mode: F, bottom: ConstantColor, top: ConstantColor) -> ConstantColor
where
    F: Fn(f64, f64) -> f64 + Copy,
{
    let ab = bottom.alpha;
    let at = top.alpha;
    let ar = at + ab * (1.0 - at);
    let bottom_channels = bottom.channels().map(|c| c / 255.0);
    let top_channels = top.channels().map(|c| c / 255.0);
    let mut result = [0.0; 3];
    for i in 0..3 {
        let cb = bottom_channels[i];
        let cs = top_channels[i];
        let mut cr = mode(cb, cs);
        if ar > 0.0 {
            cr = (at * cs + ab * (cb - at * (cb + cs - cr))) / ar;
        }
        result[i] = cr;
    }
    ConstantColor::new(
        to_channel(result[0]),
        to_channel(result[1]),
        to_channel(result[2]),
    )
    .with_alpha(ar)
}

fn blend_multiply(a: f64, b: f64) -> f64 {
    a * b
}

fn blend_screen(a: f64, b: f64) -> f64 {
    a + b - a * b
}

fn blend_overlay(base: f64, overlay: f64) -> f64 {
    if base <= 0.5 {
        blend_multiply(base * 2.0, overlay)
    } else {
        blend_screen(base * 2.0 - 1.0, overlay)
    }
}

fn hex_value(hex: &str) -> Option<u8> {
    u8::from_str_radix(hex, 16).ok()
}

fn rgb_to_hsl(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < f64::EPSILON {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };

    let h = if (max - r).abs() < f64::EPSILON {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if (max - g).abs() < f64::EPSILON {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    } / 6.0;

    (h, s, l)
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> [f64; 3] {
    if s <= 0.0 {
        return [l, l, l];
    }

    let q = if l < 0.5 {
        l * (1.0 + s)
    } else {
        l + s - l * s
    };
    let p = 2.0 * l - q;

    [
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
    ]
}

fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    match t {
        _ if t < 1.0 / 6.0 => p + (q - p) * 6.0 * t,
        _ if t < 1.0 / 2.0 => q,
        _ if t < 2.0 / 3.0 => p + (q - p) * (2.0 / 3.0 - t) * 6.0,
        _ => p,
    }
}

/// 归一化通道转回 0..=255；先在 1e-6 精度上取整，避免 76.49999… 这类浮点误差改变舍入方向。
fn to_channel(value: f64) -> u8 {
    let scaled = (value * 255.0 * 1e6).round() / 1e6;
    scaled.round().clamp(0.0, 255.0) as u8
}

fn format_float(value: f64) -> String {
    let mut formatted = format!("{value:.3}");
    while formatted.contains('.') && formatted.ends_with('0') {
        formatted.pop();
    }
    if formatted.ends_with('.') {
        formatted.pop();
    }
    if formatted.is_empty() {
        "0".to_string()
    } else {
        formatted
    }
}

const NAMED_COLORS: &[(&str, u32)] = &[
    ("aliceblue", 0xf0f8ff),
    ("antiquewhite", 0xfaebd7),
    ("aqua", 0x00ffff),
    ("aquamarine", 0x7fffd4),
    ("azure", 0xf0ffff),
    ("beige", 0xf5f5dc),
    ("bisque", 0xffe4c4),
    ("black", 0x000000),
    ("blanchedalmond", 0xffebcd),
    ("blue", 0x0000ff),
    ("blueviolet", 0x8a2be2),
    ("brown", 0xa52a2a),
    ("burlywood", 0xdeb887),
    ("cadetblue", 0x5f9ea0),
    ("chartreuse", 0x7fff00),
    ("chocolate", 0xd2691e),
    ("coral", 0xff7f50),
    ("cornflowerblue", 0x6495ed),
    ("cornsilk", 0xfff8dc),
    ("crimson", 0xdc143c),
    ("cyan", 0x00ffff),
    ("darkblue", 0x00008b),
    ("darkcyan", 0x008b8b),
    ("darkgoldenrod", 0xb8860b),
    ("darkgray", 0xa9a9a9),
    ("darkgreen", 0x006400),
    ("darkgrey", 0xa9a9a9),
    ("darkkhaki", 0xbdb76b),
    ("darkmagenta", 0x8b008b),
    ("darkolivegreen", 0x556b2f),
    ("darkorange", 0xff8c00),
    ("darkorchid", 0x9932cc),
    ("darkred", 0x8b0000),
    ("darksalmon", 0xe9967a),
    ("darkseagreen", 0x8fbc8f),
    ("darkslateblue", 0x483d8b),
    ("darkslategray", 0x2f4f4f),
    ("darkslategrey", 0x2f4f4f),
    ("darkturquoise", 0x00ced1),
    ("darkviolet", 0x9400d3),
    ("deeppink", 0xff1493),
    ("deepskyblue", 0x00bfff),
    ("dimgray", 0x696969),
    ("dimgrey", 0x696969),
    ("dodgerblue", 0x1e90ff),
    ("firebrick", 0xb22222),
    ("floralwhite", 0xfffaf0),
    ("forestgreen", 0x228b22),
    ("fuchsia", 0xff00ff),
    ("gainsboro", 0xdcdcdc),
    ("ghostwhite", 0xf8f8ff),
    ("gold", 0xffd700),
    ("goldenrod", 0xdaa520),
    ("gray", 0x808080),
    ("green", 0x008000),
    ("greenyellow", 0xadff2f),
    ("grey", 0x808080),
    ("honeydew", 0xf0fff0),
    ("hotpink", 0xff69b4),
    ("indianred", 0xcd5c5c),
    ("indigo", 0x4b0082),
    ("ivory", 0xfffff0),
    ("khaki", 0xf0e68c),
    ("lavender", 0xe6e6fa),
    ("lavenderblush", 0xfff0f5),
    ("lawngreen", 0x7cfc00),
    ("lemonchiffon", 0xfffacd),
    ("lightblue", 0xadd8e6),
    ("lightcoral", 0xf08080),
    ("lightcyan", 0xe0ffff),
    ("lightgoldenrodyellow", 0xfafad2),
    ("lightgray", 0xd3d3d3),
    ("lightgreen", 0x90ee90),
    ("lightgrey", 0xd3d3d3),
    ("lightpink", 0xffb6c1),
    ("lightsalmon", 0xffa07a),
    ("lightseagreen", 0x20b2aa),
    ("lightskyblue", 0x87cefa),
    ("lightslategray", 0x778899),
    ("lightslategrey", 0x778899),
    ("lightsteelblue", 0xb0c4de),
    ("lightyellow", 0xffffe0),
    ("lime", 0x00ff00),
    ("limegreen", 0x32cd32),
    ("linen", 0xfaf0e6),
    ("magenta", 0xff00ff),
    ("maroon", 0x800000),
    ("mediumaquamarine", 0x66cdaa),
    ("mediumblue", 0x0000cd),
    ("mediumorchid", 0xba55d3),
    ("mediumpurple", 0x9370db),
    ("mediumseagreen", 0x3cb371),
    ("mediumslateblue", 0x7b68ee),
    ("mediumspringgreen", 0x00fa9a),
    ("mediumturquoise", 0x48d1cc),
    ("mediumvioletred", 0xc71585),
    ("midnightblue", 0x191970),
    ("mintcream", 0xf5fffa),
    ("mistyrose", 0xffe4e1),
    ("moccasin", 0xffe4b5),
    ("navajowhite", 0xffdead),
    ("navy", 0x000080),
    ("oldlace", 0xfdf5e6),
    ("olive", 0x808000),
    ("olivedrab", 0x6b8e23),
    ("orange", 0xffa500),
    ("orangered", 0xff4500),
    ("orchid", 0xda70d6),
    ("palegoldenrod", 0xeee8aa),
    ("palegreen", 0x98fb98),
    ("paleturquoise", 0xafeeee),
    ("palevioletred", 0xdb7093),
    ("papayawhip", 0xffefd5),
    ("peachpuff", 0xffdab9),
    ("peru", 0xcd853f),
    ("pink", 0xffc0cb),
    ("plum", 0xdda0dd),
    ("powderblue", 0xb0e0e6),
    ("purple", 0x800080),
    ("red", 0xff0000),
    ("rosybrown", 0xbc8f8f),
    ("royalblue", 0x4169e1),
    ("saddlebrown", 0x8b4513),
    ("salmon", 0xfa8072),
    ("sandybrown", 0xf4a460),
    ("seagreen", 0x2e8b57),
    ("seashell", 0xfff5ee),
    ("sienna", 0xa0522d),
    ("silver", 0xc0c0c0),
    ("skyblue", 0x87ceeb),
    ("slateblue", 0x6a5acd),
    ("slategray", 0x708090),
    ("slategrey", 0x708090),
    ("snow", 0xfffafa),
    ("springgreen", 0x00ff7f),
    ("steelblue", 0x4682b4),
    ("tan", 0xd2b48c),
    ("teal", 0x008080),
    ("thistle", 0xd8bfd8),
    ("tomato", 0xff6347),
    ("turquoise", 0x40e0d0),
    ("violet", 0xee82ee),
    ("wheat", 0xf5deb3),
    ("white", 0xffffff),
    ("whitesmoke", 0xf5f5f5),
    ("yellow", 0xffff00),
    ("yellowgreen", 0x9acd32),
];
