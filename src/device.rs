//! Device Resolver (C2): chooses the inference device and derives the
//! default concurrency limits from it (spec §4.2). Resolved once at
//! startup and immutable for the life of the process.

use crate::config::{Config, DeviceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Device {
    pub kind: DeviceKind,
    pub index: i32,
}

impl Device {
    /// Precedence: explicit `DEVICE` > `USE_GPU=true|false` > auto-detect.
    pub fn resolve(cfg: &Config) -> Self {
        let kind = if let Some(kind) = cfg.device {
            kind
        } else if let Some(use_gpu) = cfg.use_gpu {
            if use_gpu {
                DeviceKind::Gpu
            } else {
                DeviceKind::Cpu
            }
        } else {
            auto_detect()
        };

        Device {
            kind,
            index: cfg.device_index,
        }
    }

    pub fn default_max_inflight(&self, cfg: &Config) -> usize {
        cfg.default_max_inflight(self.kind)
    }
}

/// Best-effort GPU auto-detection. Without a bundled CUDA/ROCm probe this
/// conservatively defaults to CPU — the inference runtime collaborator
/// (spec §6.2) is the one that actually knows what hardware it can see;
/// this resolver only picks the logical default when the operator hasn't
/// been explicit.
fn auto_detect() -> DeviceKind {
    DeviceKind::Cpu
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg_with(device: Option<DeviceKind>, use_gpu: Option<bool>) -> Config {
        Config {
            device,
            use_gpu,
            ..Config::default()
        }
    }

    #[test]
    fn explicit_device_wins_over_use_gpu() {
        let cfg = cfg_with(Some(DeviceKind::Cpu), Some(true));
        assert_eq!(Device::resolve(&cfg).kind, DeviceKind::Cpu);
    }

    #[test]
    fn use_gpu_wins_over_auto_detect() {
        let cfg = cfg_with(None, Some(true));
        assert_eq!(Device::resolve(&cfg).kind, DeviceKind::Gpu);
    }

    #[test]
    fn falls_back_to_auto_detect() {
        let cfg = cfg_with(None, None);
        assert_eq!(Device::resolve(&cfg).kind, DeviceKind::Cpu);
    }

    #[test]
    fn gpu_default_inflight_is_one() {
        let mut cfg = cfg_with(Some(DeviceKind::Gpu), None);
        cfg.max_workers_backend = 8;
        let device = Device::resolve(&cfg);
        assert_eq!(device.default_max_inflight(&cfg), 1);
    }
}
