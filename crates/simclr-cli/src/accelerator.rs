//! Startup check for a parallel-compute device.
//!
//! Training refuses to start on a host without a GPU adapter. The probe runs
//! once at process start and yields the `WgpuDevice` the pipeline trains on.

use burn::backend::wgpu::WgpuDevice;

/// The adapter training will run on.
#[derive(Debug, Clone)]
pub struct Accelerator {
    pub name: String,
    pub backend: String,
    pub device_type: String,
    /// burn device addressing this adapter.
    pub device: WgpuDevice,
}

/// Graphics API burn's wgpu backend enumerates adapters on by default.
fn default_backends() -> wgpu::Backends {
    if cfg!(target_os = "macos") {
        wgpu::Backends::METAL
    } else {
        wgpu::Backends::VULKAN
    }
}

/// Enumerate adapters and return the preferred hardware one.
pub fn probe() -> anyhow::Result<Accelerator> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let adapters = instance.enumerate_adapters(default_backends());
    tracing::debug!(count = adapters.len(), "Enumerated compute adapters");

    let infos: Vec<wgpu::AdapterInfo> = adapters.iter().map(|a| a.get_info()).collect();
    select(&infos).ok_or_else(|| {
        anyhow::anyhow!(
            "no GPU accelerator available ({} adapter(s) found, none usable for training)",
            infos.len()
        )
    })
}

/// burn device for the `index`-th adapter of kind `kind`, in enumeration order.
fn wgpu_device(kind: wgpu::DeviceType, index: usize) -> Option<WgpuDevice> {
    match kind {
        wgpu::DeviceType::DiscreteGpu => Some(WgpuDevice::DiscreteGpu(index)),
        wgpu::DeviceType::IntegratedGpu => Some(WgpuDevice::IntegratedGpu(index)),
        wgpu::DeviceType::VirtualGpu => Some(WgpuDevice::VirtualGpu(index)),
        wgpu::DeviceType::Cpu | wgpu::DeviceType::Other => None,
    }
}

/// Prefer discrete over integrated over virtual GPUs; never CPU or unknown adapters.
fn select(infos: &[wgpu::AdapterInfo]) -> Option<Accelerator> {
    let rank = |t: wgpu::DeviceType| match t {
        wgpu::DeviceType::DiscreteGpu => Some(0),
        wgpu::DeviceType::IntegratedGpu => Some(1),
        wgpu::DeviceType::VirtualGpu => Some(2),
        wgpu::DeviceType::Cpu | wgpu::DeviceType::Other => None,
    };

    let mut seen = [0usize; 3];
    let mut best: Option<(usize, Accelerator)> = None;
    for info in infos {
        let Some(r) = rank(info.device_type) else {
            continue;
        };
        let index = seen[r];
        seen[r] += 1;
        if best.as_ref().is_some_and(|(b, _)| *b <= r) {
            continue;
        }
        let Some(device) = wgpu_device(info.device_type, index) else {
            continue;
        };
        best = Some((
            r,
            Accelerator {
                name: info.name.clone(),
                backend: format!("{:?}", info.backend),
                device_type: format!("{:?}", info.device_type),
                device,
            },
        ));
    }
    best.map(|(_, accelerator)| accelerator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, device_type: wgpu::DeviceType) -> wgpu::AdapterInfo {
        wgpu::AdapterInfo {
            name: name.to_string(),
            vendor: 0,
            device: 0,
            device_type,
            driver: String::new(),
            driver_info: String::new(),
            backend: wgpu::Backend::Vulkan,
        }
    }

    #[test]
    fn test_cpu_and_unknown_adapters_rejected() {
        let infos = vec![
            info("llvmpipe", wgpu::DeviceType::Cpu),
            info("mystery", wgpu::DeviceType::Other),
        ];
        assert!(select(&infos).is_none());
        assert!(select(&[]).is_none());
    }

    #[test]
    fn test_discrete_preferred() {
        let infos = vec![
            info("llvmpipe", wgpu::DeviceType::Cpu),
            info("iGPU", wgpu::DeviceType::IntegratedGpu),
            info("dGPU", wgpu::DeviceType::DiscreteGpu),
        ];
        let chosen = select(&infos).unwrap();
        assert_eq!(chosen.name, "dGPU");
        assert_eq!(chosen.device_type, "DiscreteGpu");
        assert_eq!(chosen.backend, "Vulkan");
        assert_eq!(chosen.device, WgpuDevice::DiscreteGpu(0));
    }

    #[test]
    fn test_device_index_counts_same_kind_only() {
        let infos = vec![
            info("virt", wgpu::DeviceType::VirtualGpu),
            info("iGPU-a", wgpu::DeviceType::IntegratedGpu),
            info("iGPU-b", wgpu::DeviceType::IntegratedGpu),
        ];
        let chosen = select(&infos).unwrap();
        assert_eq!(chosen.name, "iGPU-a");
        assert_eq!(chosen.device, WgpuDevice::IntegratedGpu(0));

        let only_virtual = vec![
            info("cpu", wgpu::DeviceType::Cpu),
            info("virt", wgpu::DeviceType::VirtualGpu),
        ];
        assert_eq!(
            select(&only_virtual).unwrap().device,
            WgpuDevice::VirtualGpu(0)
        );
    }

    #[test]
    fn test_device_mapping() {
        assert_eq!(
            wgpu_device(wgpu::DeviceType::DiscreteGpu, 1),
            Some(WgpuDevice::DiscreteGpu(1))
        );
        assert_eq!(
            wgpu_device(wgpu::DeviceType::IntegratedGpu, 0),
            Some(WgpuDevice::IntegratedGpu(0))
        );
        assert_eq!(
            wgpu_device(wgpu::DeviceType::VirtualGpu, 2),
            Some(WgpuDevice::VirtualGpu(2))
        );
        assert_eq!(wgpu_device(wgpu::DeviceType::Cpu, 0), None);
        assert_eq!(wgpu_device(wgpu::DeviceType::Other, 0), None);
    }
}
