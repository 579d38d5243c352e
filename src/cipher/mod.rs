//! XOR cipher tables for HSDArc string payloads.
//!
//! # Key schedule
//! Every table is derived from a short seed.  With `s = seed[0] + seed[1]`
//! (wrapping), the seed is walked twice and each step appends `s ^= seed[i]`,
//! so a seed of `n` bytes yields a `2n`-byte cipher.  The schedule is an
//! obfuscation only; it must match the game's loader bit for bit.
//!
//! # Encoding
//! String byte `i` is XORed with `cipher[i % cipher.len()]`, except when the
//! two bytes are equal, in which case the plaintext byte is kept as is.

use std::sync::LazyLock;

/// The identity cipher.  XOR with zero leaves every byte untouched.
pub const NO_CIPHER: &[u8] = &[0];

/// Expand a seed into a cipher using the two-pass key schedule.
///
/// Seeds shorter than two bytes are treated as if padded with zeros for the
/// initial state.
pub fn make_cipher(seed: &[u8]) -> Vec<u8> {
    let first  = seed.first().copied().unwrap_or(0);
    let second = seed.get(1).copied().unwrap_or(0);
    let mut state = first.wrapping_add(second);

    let mut cipher = Vec::with_capacity(seed.len() * 2);
    for &k in seed.iter().chain(seed) {
        state ^= k;
        cipher.push(state);
    }
    cipher
}

/// Encode `bytes` with `cipher`, keeping bytes that equal their cipher byte.
///
/// An empty cipher is treated like [`NO_CIPHER`].
pub fn xor_encode(bytes: &[u8], cipher: &[u8]) -> Vec<u8> {
    if cipher.is_empty() {
        return bytes.to_vec();
    }
    bytes
        .iter()
        .zip(cipher.iter().cycle())
        .map(|(&b, &c)| if b != c { b ^ c } else { b })
        .collect()
}

// ── Seeds ────────────────────────────────────────────────────────────────────

const ID_SEED: &[u8] = &[
    0x40, 0x81, 0x80, 0x24, 0xFE, 0x4C, 0x79, 0x17, 0x2F,
    0xD6, 0xAC, 0xDA, 0x0B, 0x9A, 0x69, 0x28, 0x52,
];
const MSG_SEED: &[u8] = &[
    0x58, 0xDF, 0x3F, 0x59, 0x39, 0x85, 0x30, 0xB1, 0x2D,
    0xB0, 0x80, 0x13, 0xB3, 0xCB, 0x25, 0xB0, 0xE8, 0x5D,
    0x2E, 0x29, 0xBF, 0xC9, 0xEA, 0x70, 0x33, 0x7B, 0xE6,
    0xD3, 0xD2,
];
const TUTORIAL_SEED: &[u8] = &[
    0x0B, 0x76, 0x02, 0xC7, 0x63, 0x1F, 0xDD, 0x15, 0xE3,
    0x90, 0x7E, 0x4E, 0xC6, 0x7C, 0x60, 0x81, 0x7A, 0x94,
];
const BGM_SEED: &[u8] = &[
    0xE0, 0xAF, 0xF7, 0x8B, 0x7B, 0xA8, 0x6B, 0x3F, 0x55,
    0x15, 0x0D, 0xCE, 0x7F, 0xE9, 0x20, 0x0F, 0xE7, 0x82,
];
const GC_SEED: &[u8] = &[
    0x56, 0xEB, 0x35, 0x23, 0x93, 0x10, 0x4D, 0x99, 0x19,
    0xF0, 0x5A, 0x56, 0xE5, 0x36, 0xBD, 0xFB, 0x62, 0x1B,
];
const VG_SEED: &[u8] = &[
    0xD7, 0x76, 0x02, 0xC7, 0xA8, 0x1F, 0x5C, 0x80, 0xE3,
    0x2C, 0x7E, 0x4E, 0xC6, 0x0C, 0x94, 0x15, 0x7A, 0x60,
];
const FB_SEED: &[u8] = &[
    0x04, 0x27, 0x6E, 0x8B, 0x91, 0xE4, 0xAC, 0x1E, 0xCE,
    0x48, 0xED, 0x90, 0x34, 0xFA, 0xCD, 0x8C, 0x76, 0x1A,
    0x44, 0xA8, 0x59, 0x8D, 0xAD, 0x5E, 0xBD, 0x6C, 0x0E,
    0xE1, 0xE2,
];
const LOGIN_SEED: &[u8] = &[
    0xA9, 0xBB, 0xE3, 0xE8, 0x07, 0x8F, 0x46, 0xB8, 0xED,
    0x2F, 0xF0, 0x4B, 0x8E, 0x62, 0x7C, 0x91, 0x4E, 0x0C,
];
const SUMMON_SEED: &[u8] = &[
    0x87, 0x1C, 0xC0, 0xF8, 0x4C, 0xAC, 0xCE, 0x0D, 0x50,
    0xF0, 0x6C, 0x2B, 0x40, 0x0B, 0x7B, 0x1D, 0x3B, 0x77,
];
const HOME_SEED: &[u8] = &[
    0xE3, 0x17, 0xC8, 0xEF, 0x87, 0x81, 0x71, 0x52, 0xBC,
    0x66, 0x38, 0xBD, 0xFB, 0x5B, 0x79, 0xF1, 0xE3, 0xE1,
];
const LOADING_SEED: &[u8] = &[
    0x73, 0x76, 0xEF, 0xC7, 0xC5, 0x1F, 0x5C, 0x80, 0xE3,
    0x70, 0x7E, 0x53, 0xC6, 0xD7, 0x94, 0x15, 0x7A, 0x60,
];
const BATTLE_SEED: &[u8] = &[
    0x01, 0x6F, 0x1A, 0xF1, 0xB2, 0x3D, 0x66, 0xBE, 0x9C,
    0x76, 0x73, 0xE3, 0x4D, 0x1C, 0xA1, 0x7A, 0x1D, 0x41,
    0x19, 0x20, 0x33, 0xC6, 0x85, 0xA6,
];
const EFFECT_ARC_SEED: &[u8] = &[
    0x0B, 0x44, 0x35, 0xF4, 0x3E, 0xEB, 0xDC, 0x59, 0x62,
    0xED, 0x01, 0x74, 0xA7, 0xA8, 0x3D, 0x81, 0x64, 0x7C,
];
const SOUND_ARC_SEED: &[u8] = &[
    0x30, 0x3A, 0x10, 0xF0, 0x21, 0x33, 0x9E, 0xF9, 0xD2,
    0xA5, 0x10, 0xCA, 0x42, 0x90, 0xDC, 0x2C, 0x3C, 0x81,
];

// ── XorKey ───────────────────────────────────────────────────────────────────

/// Named cipher tables shipped with the game client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XorKey {
    Id,
    Msg,
    Tutorial,
    Bgm,
    Gc,
    Vg,
    Fb,
    Login,
    Summon,
    Home,
    Loading,
    Battle,
    EffectArc,
    SoundArc,
}

static TABLES: LazyLock<Vec<Vec<u8>>> =
    LazyLock::new(|| XorKey::ALL.iter().map(|k| make_cipher(k.seed())).collect());

impl XorKey {
    pub const ALL: [XorKey; 14] = [
        XorKey::Id,
        XorKey::Msg,
        XorKey::Tutorial,
        XorKey::Bgm,
        XorKey::Gc,
        XorKey::Vg,
        XorKey::Fb,
        XorKey::Login,
        XorKey::Summon,
        XorKey::Home,
        XorKey::Loading,
        XorKey::Battle,
        XorKey::EffectArc,
        XorKey::SoundArc,
    ];

    /// The expanded cipher.  Built once per process on first use.
    pub fn cipher(self) -> &'static [u8] {
        &TABLES[self as usize]
    }

    pub fn seed(self) -> &'static [u8] {
        match self {
            XorKey::Id        => ID_SEED,
            XorKey::Msg       => MSG_SEED,
            XorKey::Tutorial  => TUTORIAL_SEED,
            XorKey::Bgm       => BGM_SEED,
            XorKey::Gc        => GC_SEED,
            XorKey::Vg        => VG_SEED,
            XorKey::Fb        => FB_SEED,
            XorKey::Login     => LOGIN_SEED,
            XorKey::Summon    => SUMMON_SEED,
            XorKey::Home      => HOME_SEED,
            XorKey::Loading   => LOADING_SEED,
            XorKey::Battle    => BATTLE_SEED,
            XorKey::EffectArc => EFFECT_ARC_SEED,
            XorKey::SoundArc  => SOUND_ARC_SEED,
        }
    }

    /// Short name used by layouts and the CLI.
    pub fn name(self) -> &'static str {
        match self {
            XorKey::Id        => "id",
            XorKey::Msg       => "msg",
            XorKey::Tutorial  => "tutorial",
            XorKey::Bgm       => "bgm",
            XorKey::Gc        => "gc",
            XorKey::Vg        => "vg",
            XorKey::Fb        => "fb",
            XorKey::Login     => "login",
            XorKey::Summon    => "summon",
            XorKey::Home      => "home",
            XorKey::Loading   => "loading",
            XorKey::Battle    => "battle",
            XorKey::EffectArc => "effect-arc",
            XorKey::SoundArc  => "sound-arc",
        }
    }

    /// Which asset files use this table (diagnostics only).
    pub fn description(self) -> &'static str {
        match self {
            XorKey::Id        => "almost all asset files",
            XorKey::Msg       => "message files",
            XorKey::Tutorial  => "assets/Common/Tutorial/",
            XorKey::Bgm       => "assets/Common/SRPG/StageBgm/",
            XorKey::Gc        => "assets/Common/Occupation/World/",
            XorKey::Vg        => "assets/Common/Tournament/",
            XorKey::Fb        => "assets/Common/Portrait/",
            XorKey::Login     => "assets/Common/LoginBonus/",
            XorKey::Summon    => "assets/Common/Summon/",
            XorKey::Home      => "assets/Common/Home/",
            XorKey::Loading   => "assets/Common/Loading/Data.bin",
            XorKey::Battle    => "assets/Common/Battle/Asset/",
            XorKey::EffectArc => "assets/Common/Effect/arc/",
            XorKey::SoundArc  => "assets/Common/Sound/arc/",
        }
    }

    /// Parse from a layout or CLI string.  `_` and `-` are interchangeable.
    pub fn from_name(s: &str) -> Option<Self> {
        let wanted = s.to_lowercase().replace('_', "-");
        XorKey::ALL.into_iter().find(|k| k.name() == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_byte_seed_schedule() {
        assert_eq!(make_cipher(&[0x40, 0x81]), vec![0x81, 0x00, 0x40, 0xC1]);
    }

    #[test]
    fn id_table_prefix() {
        let id = XorKey::Id.cipher();
        assert_eq!(id.len(), 34);
        assert_eq!(&id[..8], &[0x81, 0x00, 0x80, 0xA4, 0x5A, 0x16, 0x6F, 0x78]);
        assert_eq!(&id[30..], &[0xD2, 0xBB, 0x93, 0xC1]);
    }

    #[test]
    fn every_table_is_twice_its_seed() {
        for key in XorKey::ALL {
            assert_eq!(key.cipher().len(), key.seed().len() * 2, "{}", key.name());
        }
    }

    #[test]
    fn short_seeds_do_not_panic() {
        assert!(make_cipher(&[]).is_empty());
        assert_eq!(make_cipher(&[0x05]), vec![0x00, 0x05]);
    }

    #[test]
    fn equal_bytes_pass_through() {
        // 'A' ^ 'A' would be 0; the encoder keeps 'A'.
        assert_eq!(xor_encode(b"AB", b"A\x01"), vec![b'A', b'B' ^ 0x01]);
    }

    #[test]
    fn cipher_repeats_cyclically() {
        assert_eq!(xor_encode(&[0x10, 0x10, 0x10], &[0x01, 0x02]), vec![0x11, 0x12, 0x11]);
    }

    #[test]
    fn empty_cipher_is_identity() {
        assert_eq!(xor_encode(b"hello", &[]), b"hello".to_vec());
        assert_eq!(xor_encode(b"hello", NO_CIPHER), b"hello".to_vec());
    }

    #[test]
    fn names_round_trip() {
        for key in XorKey::ALL {
            assert_eq!(XorKey::from_name(key.name()), Some(key));
        }
        assert_eq!(XorKey::from_name("SOUND_ARC"), Some(XorKey::SoundArc));
        assert_eq!(XorKey::from_name("nope"), None);
    }
}
