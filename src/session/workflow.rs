//! Coupled electromagnetic, structural and thermal workflows.
//!
//! These operations drive the helper object (`WB`) that
//! [`WorkbenchSession::load_workbench_code`] installs in the remote
//! interpreter, and write the solver scripts it runs.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use super::{WorkbenchSession, HELPER_VAR};
use crate::client::error::{BridgeError, BridgeResult};
use crate::client::protocol::forward_slashes;
use crate::client::WorkbenchClient;
use crate::script::{ScriptArg, ScriptBuilder, ScriptCall};
use crate::session::ProjectPaths;

/// Switches for the coupled workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowOptions {
    /// Geometry is taken from the SpaceClaim system.
    pub use_spaceclaim: bool,
    /// Geometry is taken from DesignModeler when SpaceClaim is off.
    pub use_design_modeler: bool,
    /// Materials come from a second electromagnetic design.
    pub material_hfss: bool,
    /// Open the solver window while scripts run.
    pub mechanical_gui: bool,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            use_spaceclaim: true,
            use_design_modeler: false,
            material_hfss: false,
            mechanical_gui: true,
        }
    }
}

/// Files the helper object imports into the workbench project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkedProjects {
    /// Electromagnetic design project.
    pub design_project: Option<PathBuf>,
    /// Project holding the material design.
    pub material_project: Option<PathBuf>,
    /// Geometry project.
    pub geometry_project: Option<PathBuf>,
    /// Temperature map.
    pub temperature_map: Option<PathBuf>,
    /// Board layout.
    pub pcb: Option<PathBuf>,
}

/// Where the helper object's source and resources live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperCode {
    /// Script defining the helper class.
    pub script: PathBuf,
    /// Directory added to the remote module search path.
    pub resource_dir: PathBuf,
}

fn linked_arg(path: Option<&Path>) -> ScriptArg {
    // The helper expects the text "None" for files that are not linked.
    path.map_or_else(
        || ScriptArg::from("None"),
        |p| ScriptArg::Str(forward_slashes(&p.to_string_lossy())),
    )
}

impl WorkbenchSession {
    /// Session for a workbench project next to an electromagnetic design
    /// project.
    ///
    /// The workbench project is `<design dir>/<name>.wbpj`, where the name
    /// defaults to the design project's file stem.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DesignProject`] if the design project does not
    /// exist or is locked by a running editor.
    pub fn for_design_project(
        client: WorkbenchClient,
        design_project: &Path,
        wb_project_name: Option<&str>,
    ) -> BridgeResult<Self> {
        if !design_project.is_file() {
            error!(project = %design_project.display(), "The design project file does not exist");
            return Err(BridgeError::design_project(design_project, "does not exist"));
        }
        let mut lock = OsString::from(design_project.as_os_str());
        lock.push(".lock");
        if Path::new(&lock).exists() {
            error!(project = %design_project.display(), "The design project is locked, close it first");
            return Err(BridgeError::design_project(design_project, "is locked"));
        }

        let stem = design_project
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = wb_project_name.unwrap_or(&stem);
        let dir = design_project.parent().unwrap_or_else(|| Path::new(""));
        let paths = ProjectPaths::new(dir.join(format!("{name}.wbpj")));

        Ok(Self::new(client, paths).with_linked(LinkedProjects {
            design_project: Some(design_project.to_path_buf()),
            ..LinkedProjects::default()
        }))
    }

    /// Statement creating the helper object for this project.
    #[must_use]
    pub fn helper_init_statement(&self, resource_dir: &Path) -> String {
        let linked = &self.linked;
        let call = ScriptCall::new("", "WBMultiphysics")
            .arg(self.paths.project_dir())
            .arg(self.paths.name())
            .arg(forward_slashes(&resource_dir.to_string_lossy()))
            .arg(linked_arg(linked.design_project.as_deref()))
            .arg(linked_arg(linked.material_project.as_deref()))
            .arg(linked_arg(linked.geometry_project.as_deref()))
            .arg(linked_arg(linked.temperature_map.as_deref()))
            .arg(linked_arg(linked.pcb.as_deref()));
        format!("{HELPER_VAR}={call}")
    }

    /// Sends the helper script and creates the helper object.
    ///
    /// Solver scripts must be exported before this when the solver is used.
    pub async fn load_workbench_code(&self, helpers: &HelperCode) -> bool {
        let init = self.helper_init_statement(&helpers.resource_dir);
        self.load_helpers(&helpers.script, &init).await
    }

    /// Launches the workbench and loads the helper object.
    pub async fn launch_workbench(&mut self, helpers: &HelperCode) -> bool {
        self.launch().await && self.load_workbench_code(helpers).await
    }

    /// Launches the workbench and imports one design of the linked design
    /// project.
    pub async fn add_design_to_workbench(&mut self, design: &str, helpers: &HelperCode) -> bool {
        info!(design, "Adding design to workbench");
        self.launch_workbench(helpers).await && self.import_hfss(design).await
    }

    /// Extracts an archived project to `<archive stem>.wbpj`.
    pub async fn unarchive_project(&self, archive: &Path) -> bool {
        let project = archive.with_extension("wbpj");
        let call = ScriptCall::new("", "Unarchive")
            .kwarg("ArchivePath", forward_slashes(&archive.to_string_lossy()))
            .kwarg("ProjectPath", forward_slashes(&project.to_string_lossy()))
            .kwarg("Overwrite", true);
        self.command(&call.to_string()).await
    }

    /// Refreshes and updates the project.
    pub async fn update(&self) -> bool {
        info!("Updating project");
        let refreshed = self.command("Refresh()").await;
        let updated = self.command("Update()").await;
        refreshed && updated
    }

    /// Updates every design point in a background session.
    pub async fn update_all(&self) -> bool {
        info!("Updating all design points");
        self.command("backgroundSession1 = UpdateAllDesignPoints()")
            .await
    }

    /// Updates the electromagnetic system.
    pub async fn update_hfss(&self) -> bool {
        self.helper("update_hfss").await
    }

    /// Changes the feedback iterator settings.
    pub async fn update_iterations(&self, iterations: u32, delta_t: f64, delta_d: f64) -> bool {
        self.invoke(
            HELPER_VAR,
            "update_iterations",
            vec![iterations.into(), delta_t.into(), delta_d.into()],
        )
        .await
    }

    /// Imports a design of the linked design project.
    pub async fn import_hfss(&self, design: &str) -> bool {
        info!(design, "Importing electromagnetic design");
        self.invoke(HELPER_VAR, "import_hfss", vec![design.into()])
            .await
    }

    /// Imports the material design of the linked material project.
    pub async fn import_material_hfss(&self, design: &str) -> bool {
        info!(design, "Importing material design");
        self.invoke(HELPER_VAR, "import_material_hfss", vec![design.into()])
            .await
    }

    /// Imports the linked geometry into DesignModeler.
    pub async fn import_dm(&self) -> bool {
        info!("Importing DesignModeler geometry");
        self.helper("import_dm").await
    }

    /// Imports the linked geometry into SpaceClaim.
    pub async fn import_scdm(&self) -> bool {
        info!("Importing SpaceClaim geometry");
        self.helper("import_scdm").await
    }

    /// Imports the linked field data.
    pub async fn import_externaldata_fld(&self) -> bool {
        self.helper("import_externaldata_fld").await
    }

    /// Imports the linked board layout.
    pub async fn import_externaldata_pcb(&self) -> bool {
        self.helper("import_externaldata_pcb").await
    }

    /// Adds a structural system fed by the electromagnetic design.
    ///
    /// Engineering data comes from the material design when
    /// [`WorkflowOptions::material_hfss`] is set. Geometry comes from
    /// SpaceClaim, DesignModeler or the electromagnetic design, in that
    /// order of preference.
    pub async fn create_structural_link(&self) -> bool {
        info!("Creating structural system");
        let options = self.options;
        let engineering_data = if options.material_hfss {
            "transfer_material_hfss2structural_ed"
        } else {
            "transfer_hfss2structural_ed"
        };
        let geometry = if options.use_spaceclaim {
            "link_geometry_scdm2structural"
        } else if options.use_design_modeler {
            "link_geometry_dm2structural"
        } else {
            "link_geometry_hfss2structural"
        };
        self.helper_sequence(&[
            "create_structural_with_hfss",
            engineering_data,
            geometry,
            "link_setup_hfss2structural",
        ])
        .await
    }

    /// Adds a thermal system fed by the electromagnetic design.
    pub async fn create_thermal_link(&self) -> bool {
        info!("Creating thermal system");
        let geometry = if self.options.use_spaceclaim {
            "link_geometry_scdm2thermal"
        } else {
            "link_geometry_hfss2thermal"
        };
        self.helper_sequence(&[
            "create_thermal_with_hfss",
            "transfer_hfss2thermal_ed",
            geometry,
            "link_setup_hfss2thermal",
        ])
        .await
    }

    /// Adds a structural system fed by the thermal system.
    pub async fn create_structural_thermal_link(&self) -> bool {
        info!("Creating thermal-structural system");
        let results = [
            self.helper("create_structural_with_thermal").await,
            self.helper("link_setup_hfss2thermalstructural").await,
            self.helper("update_hfss").await,
            self.command("Refresh()").await,
            self.helper("link_setup_thermal2structural").await,
            self.command("Refresh()").await,
        ];
        results.iter().all(|ok| *ok)
    }

    /// Links the board layout into the structural setup.
    pub async fn create_structural_pcb_link(&self) -> bool {
        info!("Linking board layout to structural setup");
        self.helper("link_setup_pcb2structural").await
    }

    /// Links the temperature map into the structural setup.
    pub async fn create_structural_temperaturemap_link(&self) -> bool {
        info!("Linking temperature map to structural setup");
        self.helper("link_setup_temperaturemap2structural").await
    }

    /// Runs `<name>_Setup.py` in the solver.
    pub async fn run_setup_script(&self) -> bool {
        info!("Running solver setup script");
        let gui = self.options.mechanical_gui;
        self.invoke(HELPER_VAR, "run_setup_script", vec![gui.into()])
            .await
    }

    /// Runs `<name>_Report.py` in the solver.
    pub async fn run_report_script(&self) -> bool {
        info!("Running solver report script");
        self.invoke(HELPER_VAR, "run_report_script", vec![true.into()])
            .await
    }

    /// Refreshes the structural engineering data.
    pub async fn structural_update_ed(&self) -> bool {
        self.helper("modify_structural_ed").await
    }

    /// Refreshes the structural mesh.
    pub async fn structural_update_mesh(&self) -> bool {
        self.helper("modify_structural_mesh").await
    }

    /// Refreshes the structural setup.
    pub async fn structural_update_setup(&self) -> bool {
        self.helper("modify_structural_setup").await
    }

    /// Refreshes the thermal setup.
    pub async fn thermal_update_setup(&self) -> bool {
        self.helper("modify_thermal_setup").await
    }

    /// Refreshes the thermal solution.
    pub async fn thermal_update_solution(&self) -> bool {
        self.helper("modify_thermal_solution").await
    }

    /// Refreshes the thermal engineering data.
    pub async fn thermal_update_ed(&self) -> bool {
        self.helper("modify_thermal_ed").await
    }

    /// Refreshes the thermal-structural setup.
    pub async fn structural_thermal_update_setup(&self) -> bool {
        self.helper("modify_structuralthermal_setup").await
    }

    /// Refreshes the thermal-structural solution.
    pub async fn structural_thermal_update_solution(&self) -> bool {
        self.helper("modify_structuralthermal_solution").await
    }

    /// Writes `<project dir>/<name>_Setup.py`, after the wrapper source if
    /// one is given.
    pub async fn export_mechanical_script(&self, wrapper: Option<&Path>) -> bool {
        let target = PathBuf::from(self.paths.script_file("Setup"));
        info!(file = %target.display(), "Writing solver setup script");
        let rendered = render_solver_script(&target, wrapper, |source| {
            self.mechanical.setup_script(source)
        })
        .await;
        log_export(rendered)
    }

    /// Writes `<project dir>/<name>_Report.py`, after the wrapper source if
    /// one is given.
    pub async fn export_mechanical_report_script(&self, wrapper: Option<&Path>) -> bool {
        let target = PathBuf::from(self.paths.script_file("Report"));
        info!(file = %target.display(), "Writing solver report script");
        let pictures = self.paths.pictures_dir();
        let rendered = render_solver_script(&target, wrapper, |source| {
            self.mechanical.report_script(source, &pictures)
        })
        .await;
        log_export(rendered)
    }

    async fn helper(&self, method: &str) -> bool {
        self.invoke(HELPER_VAR, method, Vec::new()).await
    }

    /// Calls every method, even after a failure.
    async fn helper_sequence(&self, methods: &[&str]) -> bool {
        let mut all_ok = true;
        for method in methods {
            all_ok &= self.helper(method).await;
        }
        all_ok
    }
}

async fn render_solver_script<F>(
    target: &Path,
    wrapper: Option<&Path>,
    render: F,
) -> BridgeResult<()>
where
    F: FnOnce(Option<&str>) -> ScriptBuilder,
{
    let source = match wrapper {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| BridgeError::script_read(path, e))?,
        ),
        None => None,
    };
    render(source.as_deref()).write_to(target).await
}

fn log_export(result: BridgeResult<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "Could not write solver script");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(project: &str) -> WorkbenchSession {
        WorkbenchSession::new(
            WorkbenchClient::new("localhost", 8001),
            ProjectPaths::new(project),
        )
    }

    #[test]
    fn helper_init_with_unlinked_files() {
        let s = session("C:/work/Antenna.wbpj").with_linked(LinkedProjects {
            design_project: Some(PathBuf::from(r"C:\work\Antenna.aedt")),
            ..LinkedProjects::default()
        });
        assert_eq!(
            s.helper_init_statement(Path::new("/opt/helpers")),
            r#"WB=WBMultiphysics("C:/work","Antenna","/opt/helpers","C:/work/Antenna.aedt","None","None","None","None")"#
        );
    }

    #[test]
    fn default_options() {
        let options = WorkflowOptions::default();
        assert!(options.use_spaceclaim);
        assert!(!options.use_design_modeler);
        assert!(!options.material_hfss);
        assert!(options.mechanical_gui);
    }

    #[test]
    fn design_project_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("Antenna.aedt");
        let err = WorkbenchSession::for_design_project(
            WorkbenchClient::new("localhost", 8001),
            &missing,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, BridgeError::DesignProject { reason: "does not exist", .. }));
    }

    #[test]
    fn locked_design_project_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("Antenna.aedt");
        std::fs::write(&project, "").unwrap();
        std::fs::write(dir.path().join("Antenna.aedt.lock"), "").unwrap();

        let err = WorkbenchSession::for_design_project(
            WorkbenchClient::new("localhost", 8001),
            &project,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, BridgeError::DesignProject { reason: "is locked", .. }));
    }

    #[test]
    fn workbench_project_sits_next_to_design() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("Antenna.aedt");
        std::fs::write(&project, "").unwrap();
        let client = || WorkbenchClient::new("localhost", 8001);

        let by_stem = WorkbenchSession::for_design_project(client(), &project, None).unwrap();
        let named =
            WorkbenchSession::for_design_project(client(), &project, Some("Coupled")).unwrap();

        assert_eq!(by_stem.paths().name(), "Antenna");
        assert_eq!(named.paths().name(), "Coupled");
        assert_eq!(
            named.paths().project_dir(),
            forward_slashes(&dir.path().to_string_lossy())
        );
        assert_eq!(named.linked().design_project.as_deref(), Some(project.as_path()));
    }
}
