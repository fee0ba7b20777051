use crate::errors::{Error, configuration_error};

/// Configuration of a kCSD 2D estimation
///
/// Every field has a documented default; `None` bounds and spacings are derived from the
/// electrode positions when the grids are built.
#[derive(Clone, Debug, PartialEq)]
pub struct Kcsd2dConfig {
    /// Conductivity of the medium, default 1.0
    pub sigma: f64,
    /// Requested number of basis sources, default 1000
    pub n_src_init: usize,
    /// Requested radius of the basis sources, snapped to the source lattice, default 1.0
    pub r_init: f64,
    /// Thickness of the tissue slice, default 1.0
    pub h: f64,
    /// Estimation bounds, default to the electrode bounding box
    pub x_min: Option<f64>,
    pub x_max: Option<f64>,
    pub y_min: Option<f64>,
    pub y_max: Option<f64>,
    /// Margin added on each side of the estimation area when placing the basis sources, default 0.0
    pub ext_x: f64,
    pub ext_y: f64,
    /// Estimation grid spacing, default 1% of the span of each axis
    pub gd_x: Option<f64>,
    pub gd_y: Option<f64>,
    /// Ridge regularisation strength, default 0.0
    pub lambd: f64,
    pub lookup: LookupTableTuning,
    pub forward_model: ForwardModelSettings,
}

impl Default for Kcsd2dConfig {
    fn default() -> Self {
        Kcsd2dConfig {
            sigma: 1.0,
            n_src_init: 1000,
            r_init: 1.0,
            h: 1.0,
            x_min: None,
            x_max: None,
            y_min: None,
            y_max: None,
            ext_x: 0.0,
            ext_y: 0.0,
            gd_x: None,
            gd_y: None,
            lambd: 0.0,
            lookup: LookupTableTuning::default(),
            forward_model: ForwardModelSettings::default(),
        }
    }
}

impl Kcsd2dConfig {
    /// Same margin on both axes
    pub fn with_ext(mut self, ext: f64) -> Self {
        self.ext_x = ext;
        self.ext_y = ext;
        return self;
    }

    /// Estimation bounds on both axes
    pub fn with_bounds(mut self, x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        self.x_min = Some(x_min);
        self.x_max = Some(x_max);
        self.y_min = Some(y_min);
        self.y_max = Some(y_max);
        return self;
    }

    /// Estimation grid spacing on both axes
    pub fn with_spacing(mut self, gd_x: f64, gd_y: f64) -> Self {
        self.gd_x = Some(gd_x);
        self.gd_y = Some(gd_y);
        return self;
    }

    /// Check everything which does not depend on the electrode positions
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(configuration_error(format!("`sigma` must be positive, got {}", self.sigma)));
        }
        if !(self.h.is_finite() && self.h > 0.0) {
            return Err(configuration_error(format!("`h` must be positive, got {}", self.h)));
        }
        if !(self.r_init.is_finite() && self.r_init > 0.0) {
            return Err(configuration_error(format!("`r_init` must be positive, got {}", self.r_init)));
        }
        if self.n_src_init == 0 {
            return Err(configuration_error("`n_src_init` must be at least 1"));
        }
        if !(self.ext_x.is_finite() && self.ext_y.is_finite()) {
            return Err(configuration_error(format!("`ext_x` and `ext_y` must be finite, got {}, {}", self.ext_x, self.ext_y)));
        }
        if !(self.lambd.is_finite() && self.lambd >= 0.0) {
            return Err(configuration_error(format!("`lambd` must be non-negative, got {}", self.lambd)));
        }
        for (name, bound) in [("x_min", self.x_min), ("x_max", self.x_max), ("y_min", self.y_min), ("y_max", self.y_max)] {
            if let Some(value) = bound {
                if !value.is_finite() {
                    return Err(configuration_error(format!("`{}` must be finite, got {}", name, value)));
                }
            }
        }
        for (name, spacing) in [("gd_x", self.gd_x), ("gd_y", self.gd_y)] {
            if let Some(value) = spacing {
                if !(value.is_finite() && value > 0.0) {
                    return Err(configuration_error(format!("`{}` must be positive, got {}", name, value)));
                }
            }
        }
        self.lookup.validate()?;
        self.forward_model.validate()?;

        return Ok(());
    }
}

/// Sampling of the forward model when building the distance lookup table
///
/// All positions are in table-index units, i.e. `index / density * dist_max` is a distance.
/// The defaults are empirical: the potential has most of its curvature around the source
/// radius, between `border1` and `border2`.
#[derive(Clone, Debug, PartialEq)]
pub struct LookupTableTuning {
    /// Number of entries in the dense table
    pub density: usize,
    /// Sampling step from 0 to `border1`
    pub dense_step: f64,
    /// Sampling step from `border1` to `border2`
    pub denser_step: f64,
    /// Sampling step from `border2` to `density`
    pub sparse_step: f64,
    /// `border1 = border1_ratio * r / dist_max * density`
    pub border1_ratio: f64,
    /// `border2 = border2_ratio * r / dist_max * density`
    pub border2_ratio: f64,
}

impl Default for LookupTableTuning {
    fn default() -> Self {
        LookupTableTuning {
            density: 100,
            dense_step: 3.0,
            denser_step: 1.0,
            sparse_step: 9.0,
            border1_ratio: 0.9,
            border2_ratio: 1.3,
        }
    }
}

impl LookupTableTuning {
    pub fn validate(&self) -> Result<(), Error> {
        if self.density < 2 {
            return Err(configuration_error(format!("lookup table `density` must be at least 2, got {}", self.density)));
        }
        for (name, step) in [("dense_step", self.dense_step), ("denser_step", self.denser_step), ("sparse_step", self.sparse_step)] {
            if !(step.is_finite() && step > 0.0) {
                return Err(configuration_error(format!("lookup table `{}` must be positive, got {}", name, step)));
            }
        }
        if !(self.border1_ratio.is_finite() && self.border1_ratio > 0.0 && self.border2_ratio.is_finite() && self.border2_ratio > self.border1_ratio) {
            return Err(configuration_error(format!(
                "lookup table borders need 0 < border1_ratio < border2_ratio, got {}, {}",
                self.border1_ratio, self.border2_ratio
            )));
        }
        return Ok(());
    }
}

/// Numerical integration settings of the forward model
#[derive(Clone, Debug, PartialEq)]
pub struct ForwardModelSettings {
    /// Relative tolerance of the double integral; loose because the lookup table is smoothed afterwards
    pub relative_tolerance: f64,
    /// Floor on the source-to-point distance, avoids the singularity of `asinh(h / distance)`
    pub distance_floor: f64,
    /// Maximum number of sub-intervals of each 1D adaptive integration
    pub max_subintervals: usize,
}

impl Default for ForwardModelSettings {
    fn default() -> Self {
        ForwardModelSettings {
            relative_tolerance: 1e-2,
            distance_floor: 1e-5,
            max_subintervals: 500,
        }
    }
}

impl ForwardModelSettings {
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.relative_tolerance.is_finite() && self.relative_tolerance > 0.0) {
            return Err(configuration_error(format!(
                "`relative_tolerance` must be positive, got {}",
                self.relative_tolerance
            )));
        }
        if !(self.distance_floor.is_finite() && self.distance_floor > 0.0) {
            return Err(configuration_error(format!("`distance_floor` must be positive, got {}", self.distance_floor)));
        }
        if self.max_subintervals == 0 {
            return Err(configuration_error("`max_subintervals` must be at least 1"));
        }
        return Ok(());
    }
}

#[test]
fn test_default_config_is_valid() {
    let config: Kcsd2dConfig = Kcsd2dConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.lookup.density, 100);
    assert_eq!(config.forward_model.relative_tolerance, 1e-2);
}

#[test]
fn test_config_rejects_bad_values() {
    let config: Kcsd2dConfig = Kcsd2dConfig::default().with_spacing(0.0, 0.05);
    assert!(matches!(config.validate(), Err(Error::ConfigurationError { .. })));

    let mut config: Kcsd2dConfig = Kcsd2dConfig::default();
    config.sigma = -1.0;
    assert!(matches!(config.validate(), Err(Error::ConfigurationError { .. })));

    let mut config: Kcsd2dConfig = Kcsd2dConfig::default();
    config.lookup.border2_ratio = 0.5;
    assert!(matches!(config.validate(), Err(Error::ConfigurationError { .. })));

    let mut config: Kcsd2dConfig = Kcsd2dConfig::default();
    config.x_min = Some(f64::NAN);
    assert!(matches!(config.validate(), Err(Error::ConfigurationError { .. })));
}
