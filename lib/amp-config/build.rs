// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{bail, Result};
use serde::Deserialize;
use std::io::Write;
use std::ops::Range;
use std::path::Path;

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct BoardConfig {
    hwsem: HwsemConfig,
    whc: WhcConfig,
    sys: SysConfig,
    shared: SharedConfig,
    rpmsg: RpmsgConfig,
    trace: TraceConfig,
    secondary: SecondaryConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct HwsemConfig {
    base: u64,
    channels: u8,
    lock_attempts: u32,
    reset: ResetConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct WhcConfig {
    app_base: u64,
    rt_base: u64,
    channels: u8,
    reset: ResetConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct SysConfig {
    base: u64,
}

#[derive(Copy, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ResetConfig {
    register: u8,
    bit: u8,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct SharedConfig {
    base: u32,
    size: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RpmsgConfig {
    features: u32,
    notify_id: u32,
    tx: VringConfig,
    rx: VringConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct VringConfig {
    da: u32,
    align: u32,
    num: u32,
    notify_id: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct TraceConfig {
    da: u32,
    len: u32,
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct SecondaryConfig {
    load_base: u32,
    load_size: u32,
    boot_flag: u32,
    boot_magic: u32,
    release_spin: u32,
    wait_attempts: u32,
    reset: ResetConfig,
}

/// Bytes occupied by a split virtqueue of `num` descriptors whose used ring
/// starts on an `align` boundary.
fn vring_size(num: u32, align: u32) -> u64 {
    let num = u64::from(num);
    let align = u64::from(align);
    let avail_end = 16 * num + 2 * (3 + num);
    let used = avail_end.div_ceil(align) * align;
    used + 2 * 3 + 8 * num
}

fn span(base: u32, len: u64) -> Range<u64> {
    u64::from(base)..u64::from(base) + len
}

fn check_vring(
    name: &str,
    v: &VringConfig,
    window: &Range<u64>,
) -> Result<()> {
    if !v.align.is_power_of_two() {
        bail!("{name}: alignment {:#x} is not a power of two", v.align);
    }
    if v.da % v.align != 0 {
        bail!("{name}: address {:#x} not aligned to {:#x}", v.da, v.align);
    }
    if v.num == 0 || !v.num.is_power_of_two() {
        bail!("{name}: buffer count {} is not a power of two", v.num);
    }
    let r = span(v.da, vring_size(v.num, v.align));
    if r.start < window.start || r.end > window.end {
        bail!("{name}: {r:#x?} lies outside the shared window");
    }
    Ok(())
}

fn check_reset(name: &str, r: &ResetConfig) -> Result<()> {
    if r.register > 3 || r.bit > 31 {
        bail!(
            "{name}: reset line {}:{} does not exist",
            r.register,
            r.bit
        );
    }
    Ok(())
}

fn check(cfg: &BoardConfig) -> Result<()> {
    if cfg.hwsem.channels == 0 || cfg.hwsem.channels > 32 {
        bail!(
            "hwsem: {} channels won't fit the interrupt registers",
            cfg.hwsem.channels
        );
    }
    if cfg.whc.channels == 0 || cfg.whc.channels > 16 {
        bail!(
            "whc: {} channels won't fit the interrupt registers",
            cfg.whc.channels
        );
    }
    check_reset("hwsem", &cfg.hwsem.reset)?;
    check_reset("whc", &cfg.whc.reset)?;
    check_reset("secondary", &cfg.secondary.reset)?;

    let window = span(cfg.shared.base, u64::from(cfg.shared.size));
    check_vring("rpmsg.tx", &cfg.rpmsg.tx, &window)?;
    check_vring("rpmsg.rx", &cfg.rpmsg.rx, &window)?;
    if cfg.rpmsg.tx.notify_id == cfg.rpmsg.rx.notify_id {
        bail!(
            "rpmsg: both vrings use notify id {}",
            cfg.rpmsg.tx.notify_id
        );
    }

    let trace = span(cfg.trace.da, u64::from(cfg.trace.len));
    if trace.is_empty()
        || trace.start < window.start
        || trace.end > window.end
    {
        bail!("trace: {trace:#x?} lies outside the shared window");
    }
    if cfg.trace.name.len() >= 32 {
        bail!("trace: name {:?} is longer than 31 bytes", cfg.trace.name);
    }

    if cfg.secondary.boot_flag % 4 != 0 {
        bail!(
            "secondary: boot flag {:#x} is not word aligned",
            cfg.secondary.boot_flag
        );
    }
    if cfg.secondary.boot_magic == 0 {
        bail!("secondary: boot magic must be non-zero");
    }
    let flag = span(cfg.secondary.boot_flag, 4);
    if flag.start < window.start || flag.end > window.end {
        bail!("secondary: boot flag {flag:#x?} is outside the shared window");
    }

    let ring = |v: &VringConfig| span(v.da, vring_size(v.num, v.align));
    let image = span(
        cfg.secondary.load_base,
        u64::from(cfg.secondary.load_size),
    );
    let regions = [
        ("rpmsg.tx", ring(&cfg.rpmsg.tx)),
        ("rpmsg.rx", ring(&cfg.rpmsg.rx)),
        ("trace", trace),
        ("boot flag", flag),
        ("secondary image", image),
    ];
    for (i, (a, ra)) in regions.iter().enumerate() {
        for (b, rb) in &regions[i + 1..] {
            if ra.start < rb.end && rb.start < ra.end {
                bail!("{a} {ra:#x?} overlaps {b} {rb:#x?}");
            }
        }
    }
    Ok(())
}

fn reset_const(r: &ResetConfig) -> String {
    format!(
        "crate::ResetBit {{ register: {}, bit: {} }}",
        r.register, r.bit
    )
}

fn vring_const(v: &VringConfig) -> String {
    format!(
        "crate::Vring {{ da: {:#x}, align: {:#x}, num: {}, notify_id: {} }}",
        v.da, v.align, v.num, v.notify_id
    )
}

fn main() -> Result<()> {
    let manifest = std::env::var("CARGO_MANIFEST_DIR")?;
    let default = Path::new(&manifest).join("../../boards/amp-evb.toml");
    let cfg = build_util::board_config::<BoardConfig>(&default)?;
    check(&cfg)?;

    let out_dir = std::env::var("OUT_DIR")?;
    let dest_path = Path::new(&out_dir).join("amp_config.rs");
    let mut out = std::fs::File::create(dest_path)?;

    writeln!(
        out,
        r#"
pub mod hwsem {{
    pub const BASE: usize = {:#x};
    pub const CHANNELS: u8 = {};
    pub const LOCK_ATTEMPTS: u32 = {};
    pub const RESET: crate::ResetBit = {};
}}

pub mod whc {{
    pub const APP_BASE: usize = {:#x};
    pub const RT_BASE: usize = {:#x};
    pub const CHANNELS: u8 = {};
    pub const RESET: crate::ResetBit = {};
}}

pub mod sys {{
    pub const BASE: usize = {:#x};
}}

pub const SHARED: crate::Region = crate::Region {{ base: {:#x}, size: {:#x} }};
"#,
        cfg.hwsem.base,
        cfg.hwsem.channels,
        cfg.hwsem.lock_attempts,
        reset_const(&cfg.hwsem.reset),
        cfg.whc.app_base,
        cfg.whc.rt_base,
        cfg.whc.channels,
        reset_const(&cfg.whc.reset),
        cfg.sys.base,
        cfg.shared.base,
        cfg.shared.size,
    )?;

    writeln!(
        out,
        r#"
pub mod rpmsg {{
    pub const FEATURES: u32 = {:#x};
    pub const NOTIFY_ID: u32 = {};
    pub const TX: crate::Vring = {};
    pub const RX: crate::Vring = {};
}}

pub mod trace {{
    pub const BUFFER: crate::Region = crate::Region {{ base: {:#x}, size: {:#x} }};
    pub const NAME: &str = {:?};
}}

pub mod secondary {{
    pub const LOAD: crate::Region = crate::Region {{ base: {:#x}, size: {:#x} }};
    pub const BOOT_FLAG: usize = {:#x};
    pub const BOOT_MAGIC: u32 = {:#x};
    pub const RELEASE_SPIN: u32 = {};
    pub const WAIT_ATTEMPTS: u32 = {};
    pub const RESET: crate::ResetBit = {};
}}
"#,
        cfg.rpmsg.features,
        cfg.rpmsg.notify_id,
        vring_const(&cfg.rpmsg.tx),
        vring_const(&cfg.rpmsg.rx),
        cfg.trace.da,
        cfg.trace.len,
        cfg.trace.name,
        cfg.secondary.load_base,
        cfg.secondary.load_size,
        cfg.secondary.boot_flag,
        cfg.secondary.boot_magic,
        cfg.secondary.release_spin,
        cfg.secondary.wait_attempts,
        reset_const(&cfg.secondary.reset),
    )?;

    Ok(())
}
