mod art_style;

pub use art_style::ArtStyle;
