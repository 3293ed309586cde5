//! Solver input scripts for the structural and thermal systems.
//!
//! Geometry, mesh, setup and report steps are recorded as calls on the
//! objects a wrapper script defines inside the solver (`geo`, `m`, `setup`
//! and `rep`). [`MechanicalModel::setup_script`] and
//! [`MechanicalModel::report_script`] render them into the `_Setup.py` and
//! `_Report.py` files the workbench helper runs.
//!
//! Keyword arguments are sorted by name and `None` values are left out.
//! Calls keep the order they were recorded in; steps that can only happen
//! once (global mesh, structural setup, ...) replace their earlier call.

use indexmap::IndexMap;

use crate::script::{ScriptArg, ScriptBuilder, ScriptCall};

/// Report name used when none is given.
pub const ALL_BODIES: &str = "AllBodies";

#[derive(Debug, Clone)]
struct CallLog {
    target: &'static str,
    calls: Vec<ScriptCall>,
}

impl CallLog {
    const fn new(target: &'static str) -> Self {
        Self {
            target,
            calls: Vec::new(),
        }
    }

    fn call(&self, method: &str) -> ScriptCall {
        ScriptCall::new(self.target, method)
    }

    fn push(&mut self, call: ScriptCall) {
        self.calls.push(call.sorted());
    }

    fn replace(&mut self, call: ScriptCall) {
        self.calls.retain(|c| c.method() != call.method());
        self.push(call);
    }

    fn render_into(&self, script: &mut ScriptBuilder) {
        for call in &self.calls {
            script.call(call);
        }
    }
}

fn objects(items: &[&str]) -> ScriptArg {
    ScriptArg::str_list(items.iter().copied())
}

/// Named selections, materials and body handling.
#[derive(Debug, Clone)]
pub struct GeometryData {
    /// `"mm"` selects the millimetre unit system, anything else metres.
    pub assign_units: Option<String>,
    /// Bodies suppressed in the solver.
    pub suppressed_solids: Vec<String>,
    /// Material per body.
    pub material_assignment: IndexMap<String, String>,
    /// Bodies the solver treats as dielectrics.
    pub dielectrics: Vec<String>,
    log: CallLog,
}

impl Default for GeometryData {
    fn default() -> Self {
        Self {
            assign_units: None,
            suppressed_solids: Vec::new(),
            material_assignment: IndexMap::new(),
            dielectrics: Vec::new(),
            log: CallLog::new("geo"),
        }
    }
}

impl GeometryData {
    /// Recorded calls.
    #[must_use]
    pub fn calls(&self) -> &[ScriptCall] {
        &self.log.calls
    }

    /// Scales the solver window.
    pub fn resize_ui(&mut self, ui: u32) -> &mut Self {
        let call = self.log.call("resize_ui").kwarg("ui", ui);
        self.log.replace(call);
        self
    }

    /// Applies [`GeometryData::material_assignment`].
    pub fn assign_material(&mut self) -> &mut Self {
        let call = self.log.call("assign_material");
        self.log.replace(call);
        self
    }

    /// Named selection over the given bodies.
    pub fn create_body_name_selection(&mut self, ns_name: &str, bodies: &[&str]) -> &mut Self {
        let call = self
            .log
            .call("create_body_name_selection")
            .kwarg("ns_name", ns_name)
            .kwarg("objects", objects(bodies));
        self.log.push(call);
        self
    }

    /// Named selection built by searching body names.
    pub fn create_body_name_selection_auto(
        &mut self,
        ns_name: &str,
        ns_allbodies: bool,
        ns_positive: bool,
        find_name: Option<&str>,
    ) -> &mut Self {
        let call = self
            .log
            .call("create_body_name_selection_auto")
            .kwarg("ns_name", ns_name)
            .kwarg("ns_allbodies", ns_allbodies)
            .kwarg("ns_positive", ns_positive)
            .kwarg("find_name", find_name);
        self.log.push(call);
        self
    }

    /// Named selection over the faces of the given bodies.
    pub fn create_face_name_selection(&mut self, ns_name: &str, bodies: &[&str]) -> &mut Self {
        let call = self
            .log
            .call("create_face_name_selection")
            .kwarg("ns_name", ns_name)
            .kwarg("objects", objects(bodies));
        self.log.push(call);
        self
    }

    /// Named selection over all external faces.
    pub fn create_externalface_name_selection(&mut self, ns_name: &str) -> &mut Self {
        let call = self
            .log
            .call("create_externalface_name_selection")
            .kwarg("ns_name", ns_name);
        self.log.replace(call);
        self
    }

    /// Named selection over the faces facing `gravity`, e.g. `"-Z"`.
    pub fn create_supportface_name_selection(
        &mut self,
        ns_name: &str,
        gravity: &str,
        bodies: &[&str],
    ) -> &mut Self {
        let call = self
            .log
            .call("create_supportface_name_selection")
            .kwarg("ns_name", ns_name)
            .kwarg("gravity", gravity)
            .kwarg("objects", objects(bodies));
        self.log.replace(call);
        self
    }

    /// Searches the external faces of the model.
    pub fn find_external_faces(&mut self) -> &mut Self {
        let call = self.log.call("find_external_faces");
        self.log.push(call);
        self
    }

    /// Searches the faces of one body facing `gravity`.
    pub fn find_object_face_gravity(&mut self, object_name: &str, gravity: &str) -> &mut Self {
        let call = self
            .log
            .call("find_object_face_gravity")
            .kwarg("object_name", object_name)
            .kwarg("gravity", gravity);
        self.log.push(call);
        self
    }

    /// Selects the bodies of a component.
    pub fn select_body(&mut self, component: &str) -> &mut Self {
        let call = self.log.call("select_body").kwarg("component", component);
        self.log.push(call);
        self
    }
}

/// Mesh controls.
#[derive(Debug, Clone)]
pub struct MeshData {
    log: CallLog,
}

impl Default for MeshData {
    fn default() -> Self {
        Self {
            log: CallLog::new("m"),
        }
    }
}

impl MeshData {
    /// Recorded calls.
    #[must_use]
    pub fn calls(&self) -> &[ScriptCall] {
        &self.log.calls
    }

    /// Element size on a body or, with `name_selection`, a named selection.
    pub fn assign_local_mesh(
        &mut self,
        mesh_size: f64,
        name: &str,
        name_selection: bool,
        curvature: bool,
        mesh_refinement: u32,
    ) -> &mut Self {
        let call = self
            .log
            .call("assign_local_mesh")
            .kwarg("mesh_size", mesh_size)
            .kwarg("name", name)
            .kwarg("name_selection", name_selection)
            .kwarg("curvature", curvature)
            .kwarg("mesh_refinement", mesh_refinement);
        self.log.push(call);
        self
    }

    /// Global sizing.
    pub fn assign_global_mesh(
        &mut self,
        curvature: bool,
        defeaturing: bool,
        mesh_refinement: u32,
    ) -> &mut Self {
        let call = self
            .log
            .call("assign_global_mesh")
            .kwarg("curvature", curvature)
            .kwarg("defeaturing", defeaturing)
            .kwarg("mesh_refinement", mesh_refinement);
        self.log.replace(call);
        self
    }

    /// Sweep method with a number of divisions.
    pub fn assign_local_sweep(&mut self, divisions: u32, name: &str, name_selection: bool) -> &mut Self {
        let call = self
            .log
            .call("assign_local_sweep")
            .kwarg("divisions", divisions)
            .kwarg("name", name)
            .kwarg("name_selection", name_selection);
        self.log.push(call);
        self
    }
}

/// Loads, boundary conditions and analysis settings.
///
/// The public fields are the fallbacks used when a call leaves the
/// matching argument out.
#[derive(Debug, Clone)]
pub struct SetupData {
    /// Radiation emissivity.
    pub emissivity: f64,
    /// Film coefficient per temperature.
    pub convection: Vec<(f64, f64)>,
    /// Ambient temperature in °C.
    pub ambient_temperature: f64,
    /// Weak springs in the structural setup.
    pub weak_springs: bool,
    /// Solver cores.
    pub num_cores: u32,
    /// Solver version code.
    pub version: u32,
    /// Gravity direction.
    pub gravity: String,
    log: CallLog,
}

impl Default for SetupData {
    fn default() -> Self {
        Self {
            emissivity: 0.8,
            convection: vec![(0.0, 1e-6), (100.0, 1e-5)],
            ambient_temperature: 22.0,
            weak_springs: false,
            num_cores: 4,
            version: 212,
            gravity: "-Z".to_string(),
            log: CallLog::new("setup"),
        }
    }
}

impl SetupData {
    /// Recorded calls.
    #[must_use]
    pub fn calls(&self) -> &[ScriptCall] {
        &self.log.calls
    }

    /// Maps the electromagnetic loss density onto bodies of the
    /// structural system.
    pub fn import_hfss_load_structural(
        &mut self,
        ns_bodies: &str,
        hfss_solution: u32,
        mapping_weighting: u32,
    ) -> &mut Self {
        let call = self
            .log
            .call("import_hfss_load_structural")
            .kwarg("ns_bodies", ns_bodies)
            .kwarg("hfss_solution", hfss_solution)
            .kwarg("mapping_weighting", mapping_weighting);
        self.log.push(call);
        self
    }

    /// Maps volume and surface losses onto the thermal system.
    pub fn import_hfss_load_thermal(
        &mut self,
        ns_solvebodies: &str,
        ns_solvefaces: &str,
        hfss_solution: u32,
        mapping_weighting: u32,
    ) -> &mut Self {
        let call = self
            .log
            .call("import_hfss_load_thermal")
            .kwarg("ns_solvebodies", ns_solvebodies)
            .kwarg("ns_solvefaces", ns_solvefaces)
            .kwarg("hfss_solution", hfss_solution)
            .kwarg("mapping_weighting", mapping_weighting);
        self.log.push(call);
        self
    }

    /// Inserts a command snippet with an input parameter.
    pub fn add_command(
        &mut self,
        input_argument: &str,
        parameter: &str,
        parameter_name: &str,
    ) -> &mut Self {
        let call = self
            .log
            .call("add_command")
            .kwarg("input_argument", input_argument)
            .kwarg("parameter", parameter)
            .kwarg("parameter_name", parameter_name);
        self.log.push(call);
        self
    }

    /// Convection on a named selection of faces.
    pub fn add_convection(
        &mut self,
        ns_external_surface: &str,
        convection: Option<&[(f64, f64)]>,
        ambient_temperature: Option<f64>,
    ) -> &mut Self {
        let table = convection.unwrap_or(&self.convection);
        let table = ScriptArg::Dict(
            table
                .iter()
                .map(|&(temperature, film)| (ScriptArg::Float(temperature), ScriptArg::Float(film)))
                .collect(),
        );
        let call = self
            .log
            .call("add_convection")
            .kwarg("ns_external_surface", ns_external_surface)
            .kwarg("convection", table)
            .kwarg(
                "AmbientTemp",
                ambient_temperature.unwrap_or(self.ambient_temperature),
            );
        self.log.push(call);
        self
    }

    /// Radiation to ambient from a named selection of faces.
    pub fn add_radiation(
        &mut self,
        ns_external_surface: &str,
        emissivity: Option<f64>,
        ambient_temperature: Option<f64>,
        correlation: Option<u32>,
    ) -> &mut Self {
        let call = self
            .log
            .call("add_radiation")
            .kwarg("ns_external_surface", ns_external_surface)
            .kwarg("emissivity", emissivity.unwrap_or(self.emissivity))
            .kwarg(
                "AmbientTemp",
                ambient_temperature.unwrap_or(self.ambient_temperature),
            )
            .kwarg("correlation", correlation.unwrap_or(0));
        self.log.push(call);
        self
    }

    /// Initial temperature of the thermal analysis.
    pub fn define_initial_temperature_thermal(&mut self, temperature: Option<f64>) -> &mut Self {
        let call = self
            .log
            .call("define_initial_temperature_thermal")
            .kwarg("temperature", temperature.unwrap_or(self.ambient_temperature));
        self.log.replace(call);
        self
    }

    /// Environment temperature of the structural analysis.
    pub fn define_environment_temperature(&mut self, temperature: Option<f64>) -> &mut Self {
        let call = self
            .log
            .call("define_environment_temperature")
            .kwarg("temperature", temperature.unwrap_or(self.ambient_temperature));
        self.log.replace(call);
        self
    }

    /// Fixed support under a board component.
    pub fn create_fixed_support_pcb(&mut self, component_name: &str, gravity: Option<&str>) -> &mut Self {
        let gravity = gravity.unwrap_or(&self.gravity).to_string();
        let call = self
            .log
            .call("create_fixed_support_pcb")
            .kwarg("component_name", component_name)
            .kwarg("gravity", gravity);
        self.log.push(call);
        self
    }

    /// Frictionless support on the faces facing `gravity`.
    pub fn create_frictionless(&mut self, gravity: Option<&str>) -> &mut Self {
        let gravity = gravity.unwrap_or(&self.gravity).to_string();
        let call = self.log.call("create_frictionless").kwarg("gravity", gravity);
        self.log.push(call);
        self
    }

    /// Structural analysis settings.
    pub fn create_structural_setup(
        &mut self,
        weak_spring: Option<bool>,
        num_cores: Option<u32>,
        version: Option<u32>,
    ) -> &mut Self {
        let call = self
            .log
            .call("create_structural_setup")
            .kwarg("WeakSpring", weak_spring.unwrap_or(self.weak_springs))
            .kwarg("MechNumCores", num_cores.unwrap_or(self.num_cores))
            .kwarg("version", version.unwrap_or(self.version));
        self.log.replace(call);
        self
    }
}

/// Result plots exported as pictures.
#[derive(Debug, Clone)]
pub struct ReportData {
    log: CallLog,
}

impl Default for ReportData {
    fn default() -> Self {
        Self {
            log: CallLog::new("rep"),
        }
    }
}

impl ReportData {
    /// Recorded calls.
    #[must_use]
    pub fn calls(&self) -> &[ScriptCall] {
        &self.log.calls
    }

    fn result_plot(
        &mut self,
        method: &str,
        report_name: Option<&str>,
        name_selection: Option<&str>,
        view: Option<&str>,
    ) -> &mut Self {
        let call = self
            .log
            .call(method)
            .kwarg("report_name", report_name.unwrap_or(ALL_BODIES))
            .kwarg("name_selection", name_selection)
            .kwarg("view", view);
        self.log.push(call);
        self
    }

    /// Total deformation plot.
    pub fn total_deformation(
        &mut self,
        report_name: Option<&str>,
        name_selection: Option<&str>,
        view: Option<&str>,
    ) -> &mut Self {
        self.result_plot("total_deformation", report_name, name_selection, view)
    }

    /// Equivalent stress plot.
    pub fn equivalent_stress(
        &mut self,
        report_name: Option<&str>,
        name_selection: Option<&str>,
        view: Option<&str>,
    ) -> &mut Self {
        self.result_plot("equivalent_stress", report_name, name_selection, view)
    }

    /// Temperature plot.
    pub fn temperature(
        &mut self,
        report_name: Option<&str>,
        name_selection: Option<&str>,
        view: Option<&str>,
    ) -> &mut Self {
        self.result_plot("temperature", report_name, name_selection, view)
    }

    /// Deformation along a user-defined direction.
    pub fn user_defined_deformation_report(
        &mut self,
        view: Option<&str>,
        position: Option<&str>,
    ) -> &mut Self {
        let call = self
            .log
            .call("user_defined_deformation_report")
            .kwarg("view", view)
            .kwarg("position", position);
        self.log.push(call);
        self
    }
}

/// Everything the solver scripts are built from.
#[derive(Debug, Clone, Default)]
pub struct MechanicalModel {
    /// Geometry steps and body lists.
    pub geometry: GeometryData,
    /// Mesh steps.
    pub mesh: MeshData,
    /// Loads and analysis settings.
    pub setup: SetupData,
    /// Result plots.
    pub report: ReportData,
}

impl MechanicalModel {
    /// Renders the setup script, after the wrapper source if one is given.
    #[must_use]
    pub fn setup_script(&self, wrapper: Option<&str>) -> ScriptBuilder {
        let mut script = ScriptBuilder::new();
        if let Some(wrapper) = wrapper {
            script.line(wrapper.trim_end());
        }

        let geometry = &self.geometry;
        let units = if geometry.assign_units.as_deref() == Some("mm") {
            "StandardNMM"
        } else {
            "StandardMKS"
        };
        script.assign(
            "ExtAPI.Application.ActiveUnitSystem",
            &ScriptArg::raw(format!("MechanicalUnitSystem.{units}")),
        );

        script.assign("DesktopMat", &ScriptArg::Dict(Vec::new()));
        for (body, material) in &geometry.material_assignment {
            // The solver names bodies with and without their system and part prefix.
            for key in [format!("SYS\\{body}"), body.clone(), format!("{body}\\{body}")] {
                script.assign(
                    &format!("DesktopMat[{}]", ScriptArg::Str(key)),
                    &ScriptArg::from(material.as_str()),
                );
            }
        }

        let suppressed = geometry
            .suppressed_solids
            .iter()
            .flat_map(|body| [format!("SYS\\{body}"), body.clone()])
            .map(|key| (ScriptArg::Str(key), ScriptArg::Int(1)))
            .collect();
        script.assign("WBSuppressSolids", &ScriptArg::Dict(suppressed));
        script.assign(
            "DesktopSolveInside",
            &ScriptArg::str_list(geometry.dielectrics.iter().map(String::as_str)),
        );

        script.assign("geo", &ScriptArg::raw("Geometry()"));
        geometry.log.render_into(&mut script);
        script.assign("m", &ScriptArg::raw("Mesh()"));
        self.mesh.log.render_into(&mut script);
        script.assign("setup", &ScriptArg::raw("Setup()"));
        self.setup.log.render_into(&mut script);
        script
    }

    /// Renders the report script writing pictures to `pictures_dir`.
    #[must_use]
    pub fn report_script(&self, wrapper: Option<&str>, pictures_dir: &str) -> ScriptBuilder {
        let mut script = ScriptBuilder::new();
        if let Some(wrapper) = wrapper {
            script.line(wrapper.trim_end());
        }
        script.assign("pictures_fullpath", &ScriptArg::from(pictures_dir));
        script.assign("rep", &ScriptArg::raw("Report(pictures_fullpath)"));
        self.report.log.render_into(&mut script);
        script
    }
}
