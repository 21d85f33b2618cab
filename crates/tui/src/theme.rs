use std::{fs, path::PathBuf};

use ratatui::style::Color;
use serde::Deserialize;
use serde_json::Value;

const THEME_FILE: &str = "theme.json";

#[derive(Debug, Clone)]
pub struct Theme {
    pub primary_fg: Color,
    pub accent: Color,
    pub muted: Color,
    pub create: Color,
    pub selection_bg: Color,
    pub selection_fg: Color,
    pub success: Color,
    pub warning: Color,
    pub danger: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            create: Color::Green,
            selection_bg: Color::DarkGray,
            selection_fg: Color::White,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ThemeFile {
    foreground: Option<Value>,
    accent: Option<Value>,
    muted: Option<Value>,
    create: Option<Value>,
    selection_background: Option<Value>,
    selection_foreground: Option<Value>,
    success: Option<Value>,
    warning: Option<Value>,
    danger: Option<Value>,
}

pub fn theme_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("slotdeck").join(THEME_FILE))
}

/// Load the palette, returning a status line describing what happened.
pub fn load_theme() -> (Theme, String) {
    let theme = Theme::default();
    let Some(path) = theme_path().filter(|path| path.exists()) else {
        return (theme, "Using default palette.".to_string());
    };
    let parsed = fs::read_to_string(&path)
        .map_err(|err| err.to_string())
        .and_then(|data| serde_json::from_str::<ThemeFile>(&data).map_err(|err| err.to_string()));
    match parsed {
        Ok(file) => {
            let (theme, applied) = apply(theme, &file);
            (
                theme,
                format!("Loaded theme from {} ({applied} colors).", path.display()),
            )
        }
        Err(err) => (
            theme,
            format!("Failed to read {} ({err}); using default palette.", path.display()),
        ),
    }
}

fn apply(mut theme: Theme, file: &ThemeFile) -> (Theme, usize) {
    let mut applied = 0;
    let slots: [(&Option<Value>, &mut Color); 9] = [
        (&file.foreground, &mut theme.primary_fg),
        (&file.accent, &mut theme.accent),
        (&file.muted, &mut theme.muted),
        (&file.create, &mut theme.create),
        (&file.selection_background, &mut theme.selection_bg),
        (&file.selection_foreground, &mut theme.selection_fg),
        (&file.success, &mut theme.success),
        (&file.warning, &mut theme.warning),
        (&file.danger, &mut theme.danger),
    ];
    for (value, target) in slots {
        if let Some(color) = value.as_ref().and_then(value_to_color) {
            *target = color;
            applied += 1;
        }
    }
    if file.selection_foreground.is_none() {
        theme.selection_fg = contrast_color(&theme.selection_bg, theme.selection_fg);
    }
    (theme, applied)
}

fn value_to_color(value: &Value) -> Option<Color> {
    match value {
        Value::String(text) => parse_hex_color(text),
        Value::Array(items) if items.len() >= 3 => {
            let mut rgb = [0u8; 3];
            for (idx, component) in items.iter().take(3).enumerate() {
                rgb[idx] = u8::try_from(component.as_u64()?).ok()?;
            }
            Some(Color::Rgb(rgb[0], rgb[1], rgb[2]))
        }
        _ => None,
    }
}

fn parse_hex_color(input: &str) -> Option<Color> {
    let trimmed = input.trim();
    let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(Color::Rgb(r, g, b))
        }
        3 => {
            let r = u8::from_str_radix(&hex[0..1].repeat(2), 16).ok()?;
            let g = u8::from_str_radix(&hex[1..2].repeat(2), 16).ok()?;
            let b = u8::from_str_radix(&hex[2..3].repeat(2), 16).ok()?;
            Some(Color::Rgb(r, g, b))
        }
        _ => None,
    }
}

fn contrast_color(color: &Color, fallback: Color) -> Color {
    match color {
        Color::Rgb(r, g, b) => {
            let luminance = 0.299 * f64::from(*r) + 0.587 * f64::from(*g) + 0.114 * f64::from(*b);
            if luminance > 186.0 {
                Color::Black
            } else {
                Color::White
            }
        }
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_rgb_arrays() {
        assert_eq!(parse_hex_color("#ff8000"), Some(Color::Rgb(255, 128, 0)));
        assert_eq!(parse_hex_color("0f0"), Some(Color::Rgb(0, 255, 0)));
        assert_eq!(parse_hex_color("nope"), None);
        assert_eq!(parse_hex_color("aébcd"), None);
        assert_eq!(parse_hex_color("#ééé"), None);
        assert_eq!(
            value_to_color(&serde_json::json!([1, 2, 3])),
            Some(Color::Rgb(1, 2, 3))
        );
        assert_eq!(value_to_color(&serde_json::json!([1, 2, 300])), None);
    }

    #[test]
    fn applies_known_keys_only() {
        let file: ThemeFile =
            serde_json::from_str(r##"{"accent": "#112233", "selection_background": "#eeeeee", "extra": 1}"##)
                .expect("theme parses");
        let (theme, applied) = apply(Theme::default(), &file);
        assert_eq!(applied, 2);
        assert_eq!(theme.accent, Color::Rgb(0x11, 0x22, 0x33));
        assert_eq!(theme.selection_fg, Color::Black);
    }
}
