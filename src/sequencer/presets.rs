/// Factory patterns the instrument can boot with
use super::StepStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Default,
    Pentatonic,
    CMajorArpeggio,
    AMinorArpeggio,
    FourOnFloor,
    AcidBassline,
}

impl Preset {
    pub const ALL: [Preset; 6] = [
        Preset::Default,
        Preset::Pentatonic,
        Preset::CMajorArpeggio,
        Preset::AMinorArpeggio,
        Preset::FourOnFloor,
        Preset::AcidBassline,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Default => "Default",
            Preset::Pentatonic => "Pentatonic",
            Preset::CMajorArpeggio => "C Major Arp",
            Preset::AMinorArpeggio => "A Minor Arp",
            Preset::FourOnFloor => "Four on Floor",
            Preset::AcidBassline => "Acid Bass",
        }
    }

    pub fn pitches(self) -> &'static [u8] {
        match self {
            Preset::Default => &[36, 40, 41, 43, 45, 38, 41, 48, 45, 50, 52, 59, 60, 53, 57, 55],
            Preset::Pentatonic => &[36, 38, 40, 43, 45, 48, 50, 52],
            Preset::CMajorArpeggio => &[36, 40, 43, 48, 52, 55, 60, 64],
            Preset::AMinorArpeggio => &[33, 36, 40, 45, 48, 52, 57, 60],
            Preset::FourOnFloor => &[36, 36, 36, 36],
            Preset::AcidBassline => &[
                36, 39, 41, 44, 43, 39, 36, 34, 36, 41, 43, 46, 44, 41, 39, 36,
            ],
        }
    }

    /// Matches either the display name or a snake_case key such as `acid_bass`.
    pub fn parse(name: &str) -> Option<Self> {
        let key = normalize(name);
        Self::ALL.iter().copied().find(|preset| {
            normalize(preset.name()) == key || normalize(&format!("{:?}", preset)) == key
        })
    }

    /// Replace the pattern with this preset, every gate at the default width.
    pub fn load_into(self, pattern: &mut StepStore) {
        pattern.clear();
        pattern.load_pitches(self.pitches());
        log::info!("loaded preset '{}' ({} steps)", self.name(), pattern.len());
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
