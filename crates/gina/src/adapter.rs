use crate::{
    backend::{AdapterInfo, Backend, FeatureLevel, GpuPreference, RawAdapter, RawInstance},
    error::AdapterError,
};

///A hardware adapter that passed the trial device creation.
pub struct Adapter<B: Backend> {
    raw: B::Adapter,
    info: AdapterInfo,
}

impl<B: Backend> Adapter<B> {
    ///Wraps `raw` without probing it. Used for explicitly chosen adapters, like the software fallback.
    pub fn from_raw(raw: B::Adapter) -> Result<Self, AdapterError> {
        let info = raw.info()?;
        Ok(Adapter { raw, info })
    }

    pub fn info(&self) -> &AdapterInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn raw(&self) -> &B::Adapter {
        &self.raw
    }
}

///Picks the first hardware adapter that can create a device of the required [FeatureLevel].
pub struct AdapterSelector<'a, B: Backend> {
    instance: &'a B::Instance,
    min_level: FeatureLevel,
}

impl<'a, B: Backend> AdapterSelector<'a, B> {
    pub fn new(instance: &'a B::Instance) -> Self {
        AdapterSelector {
            instance,
            min_level: FeatureLevel::default(),
        }
    }

    ///Sets the feature level candidates are probed with. Defaults to [FeatureLevel::V1_2].
    pub fn min_feature_level(mut self, level: FeatureLevel) -> Self {
        self.min_level = level;
        self
    }

    ///Enumerates all adapters and returns the first suitable one.
    ///
    /// With `prefer_high_performance` the adapters are visited fastest first, if the platform supports that ordering.
    /// Otherwise they are visited in platform order. Software adapters are never returned, adapters whose
    /// description can't be read or that fail the trial creation are skipped.
    pub fn find_adapter(&self, prefer_high_performance: bool) -> Result<Adapter<B>, AdapterError> {
        let preference = if prefer_high_performance && self.instance.supports_gpu_preference() {
            GpuPreference::HighPerformance
        } else {
            GpuPreference::Unspecified
        };

        let candidates = self.instance.enumerate_adapters(preference)?;

        for raw in candidates {
            let info = match raw.info() {
                Ok(info) => info,
                Err(_e) => {
                    #[cfg(feature = "logging")]
                    log::warn!("Skipping adapter without readable description: {}", _e);
                    continue;
                }
            };

            if info.is_software {
                #[cfg(feature = "logging")]
                log::warn!("Skipping software adapter: {}", info.name);
                continue;
            }

            if let Err(_e) = self.instance.probe_adapter(&raw, self.min_level) {
                #[cfg(feature = "logging")]
                log::warn!(
                    "Adapter {} can't create a device of feature level {}: {}",
                    info.name,
                    self.min_level,
                    _e
                );
                continue;
            }

            #[cfg(feature = "logging")]
            log::info!("Found suitable adapter: {}", info.name);

            return Ok(Adapter { raw, info });
        }

        #[cfg(feature = "logging")]
        log::error!(
            "No suitable adapter found for feature level {}",
            self.min_level
        );

        Err(AdapterError::NotFound)
    }
}
