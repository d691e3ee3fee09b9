//! Signal blocks, stepped in the S stage before any physics.

use tlm_graph::Port;
use tlm_graph::node_types::SIGNAL;
use tlm_numerics::SecondOrderTransferFunction;

use crate::base::ComponentBase;
use crate::common::{SignalNodeData, bound};
use crate::error::{ComponentError, ComponentResult};
use crate::traits::{Component, ComponentKind};

/// Unconnected ports get a private dummy node; inputs read zero from it.
fn output_port(base: &mut ComponentBase) -> ComponentResult<()> {
    base.add_port(Port::write("out", SIGNAL).optional())
}

fn input_port(base: &mut ComponentBase) -> ComponentResult<()> {
    base.add_port(Port::read("in", SIGNAL).optional())
}

#[derive(Debug)]
pub struct SignalConstant {
    base: ComponentBase,
    y: f64,
    out: Option<SignalNodeData>,
}

impl SignalConstant {
    pub const TYPE_NAME: &'static str = "SignalConstant";

    pub fn new(name: &str) -> ComponentResult<Self> {
        let mut base = ComponentBase::new(name);
        output_port(&mut base)?;
        base.add_parameter("y", "Value", "-", 1.0)?;
        Ok(Self {
            base,
            y: 0.0,
            out: None,
        })
    }
}

impl Component for SignalConstant {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Signal
    }

    fn initialize(&mut self) -> ComponentResult<()> {
        self.y = self.base.param("y")?;
        self.out = Some(SignalNodeData::bind(&self.base, "out")?);
        self.simulate_one_timestep()
    }

    fn simulate_one_timestep(&mut self) -> ComponentResult<()> {
        bound(&self.out, "constant output")?.set_value(self.y);
        Ok(())
    }
}

/// `y_0` before `t_step`, `y_0 + y_A` from then on.
#[derive(Debug)]
pub struct SignalStep {
    base: ComponentBase,
    y0: f64,
    amplitude: f64,
    t_step: f64,
    out: Option<SignalNodeData>,
}

impl SignalStep {
    pub const TYPE_NAME: &'static str = "SignalStep";

    pub fn new(name: &str) -> ComponentResult<Self> {
        let mut base = ComponentBase::new(name);
        output_port(&mut base)?;
        base.add_parameter("y_0", "Base value", "-", 0.0)?;
        base.add_parameter("y_A", "Step amplitude", "-", 1.0)?;
        base.add_parameter("t_step", "Step time", "s", 1.0)?;
        Ok(Self {
            base,
            y0: 0.0,
            amplitude: 0.0,
            t_step: 0.0,
            out: None,
        })
    }
}

impl Component for SignalStep {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Signal
    }

    fn initialize(&mut self) -> ComponentResult<()> {
        self.y0 = self.base.param("y_0")?;
        self.amplitude = self.base.param("y_A")?;
        self.t_step = self.base.param("t_step")?;
        self.out = Some(SignalNodeData::bind(&self.base, "out")?);
        self.simulate_one_timestep()
    }

    fn simulate_one_timestep(&mut self) -> ComponentResult<()> {
        let y = if self.base.time() < self.t_step {
            self.y0
        } else {
            self.y0 + self.amplitude
        };
        bound(&self.out, "step output")?.set_value(y);
        Ok(())
    }
}

#[derive(Debug)]
pub struct SignalGain {
    base: ComponentBase,
    k: f64,
    ports: Option<(SignalNodeData, SignalNodeData)>,
}

impl SignalGain {
    pub const TYPE_NAME: &'static str = "SignalGain";

    pub fn new(name: &str) -> ComponentResult<Self> {
        let mut base = ComponentBase::new(name);
        input_port(&mut base)?;
        output_port(&mut base)?;
        base.add_parameter("k", "Gain", "-", 1.0)?;
        Ok(Self {
            base,
            k: 0.0,
            ports: None,
        })
    }
}

impl Component for SignalGain {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Signal
    }

    fn initialize(&mut self) -> ComponentResult<()> {
        self.k = self.base.param("k")?;
        self.ports = Some((
            SignalNodeData::bind(&self.base, "in")?,
            SignalNodeData::bind(&self.base, "out")?,
        ));
        self.simulate_one_timestep()
    }

    fn simulate_one_timestep(&mut self) -> ComponentResult<()> {
        let (input, output) = bound(&self.ports, "gain ports")?;
        output.set_value(self.k * input.value());
        Ok(())
    }
}

/// `k / (s²/w² + 2d s/w + 1)` with output limits.
#[derive(Debug)]
pub struct SignalSecondOrderFilter {
    base: ComponentBase,
    filter: SecondOrderTransferFunction,
    ports: Option<(SignalNodeData, SignalNodeData)>,
}

impl SignalSecondOrderFilter {
    pub const TYPE_NAME: &'static str = "SignalSecondOrderFilter";

    pub fn new(name: &str) -> ComponentResult<Self> {
        let mut base = ComponentBase::new(name);
        input_port(&mut base)?;
        output_port(&mut base)?;
        base.add_parameter("w", "Break frequency", "rad/s", 1000.0)?;
        base.add_parameter("d", "Damping", "-", 1.0)?;
        base.add_parameter("k", "Gain", "-", 1.0)?;
        base.add_parameter("y_min", "Lower output limit", "-", -1.5e300)?;
        base.add_parameter("y_max", "Upper output limit", "-", 1.5e300)?;
        Ok(Self {
            base,
            filter: SecondOrderTransferFunction::default(),
            ports: None,
        })
    }
}

impl Component for SignalSecondOrderFilter {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Signal
    }

    fn initialize(&mut self) -> ComponentResult<()> {
        let w = self.base.parameters().positive("w")?;
        let d = self.base.param("d")?;
        let k = self.base.param("k")?;
        let y_min = self.base.param("y_min")?;
        let y_max = self.base.param("y_max")?;
        if y_min > y_max {
            return Err(ComponentError::InvalidParameter {
                name: "y_min".to_string(),
                what: "must not exceed y_max",
            });
        }

        let input = SignalNodeData::bind(&self.base, "in")?;
        let output = SignalNodeData::bind(&self.base, "out")?;
        let u0 = input.value();
        self.filter.initialize(
            self.base.clock(),
            self.base.timestep(),
            [k, 0.0, 0.0],
            [1.0, 2.0 * d / w, 1.0 / (w * w)],
            u0,
            k * u0,
            y_min,
            y_max,
        )?;
        output.set_value(self.filter.value());
        self.ports = Some((input, output));
        Ok(())
    }

    fn simulate_one_timestep(&mut self) -> ComponentResult<()> {
        let (input, output) = bound(&self.ports, "filter ports")?;
        output.set_value(self.filter.update(input.value())?);
        Ok(())
    }
}
