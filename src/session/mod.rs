//! Project-level operations on a running workbench.
//!
//! A [`WorkbenchSession`] pairs a [`WorkbenchClient`] with the project it is
//! working on. Its operations build statements, send them, and report
//! `true`/`false`; failures have already been logged by the client, so
//! callers can chain steps without unpacking errors.

pub mod design_points;
pub mod mechanical;
mod paths;
mod workflow;

pub use design_points::{DesignPoint, TABLE_FIRST_DATA_ROW, TABLE_HEADER_ROW};
pub use mechanical::MechanicalModel;
pub use paths::ProjectPaths;
pub use workflow::{HelperCode, LinkedProjects, WorkflowOptions};

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::client::protocol::{quoted, single_quoted_path};
use crate::client::WorkbenchClient;
use crate::script::{ScriptArg, ScriptCall};

/// Variable holding the helper object loaded into the remote interpreter.
pub const HELPER_VAR: &str = "WB";

/// A workbench project driven over the scripting socket.
#[derive(Debug)]
pub struct WorkbenchSession {
    client: WorkbenchClient,
    paths: ProjectPaths,
    options: WorkflowOptions,
    linked: LinkedProjects,
    mechanical: MechanicalModel,
}

impl WorkbenchSession {
    /// Creates a session for a project.
    #[must_use]
    pub fn new(client: WorkbenchClient, paths: ProjectPaths) -> Self {
        Self {
            client,
            paths,
            options: WorkflowOptions::default(),
            linked: LinkedProjects::default(),
            mechanical: MechanicalModel::default(),
        }
    }

    /// Sets the switches for the coupled workflows.
    #[must_use]
    pub fn with_options(mut self, options: WorkflowOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the projects the helper object links in.
    #[must_use]
    pub fn with_linked(mut self, linked: LinkedProjects) -> Self {
        self.linked = linked;
        self
    }

    /// The underlying client.
    #[must_use]
    pub const fn client(&self) -> &WorkbenchClient {
        &self.client
    }

    /// Project locations.
    #[must_use]
    pub const fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    /// Workflow switches.
    #[must_use]
    pub const fn options(&self) -> &WorkflowOptions {
        &self.options
    }

    /// Projects linked in by the helper object.
    #[must_use]
    pub const fn linked(&self) -> &LinkedProjects {
        &self.linked
    }

    /// Steps the solver scripts are rendered from.
    #[must_use]
    pub const fn mechanical(&self) -> &MechanicalModel {
        &self.mechanical
    }

    /// Mutable access for recording solver script steps.
    pub fn mechanical_mut(&mut self) -> &mut MechanicalModel {
        &mut self.mechanical
    }

    /// Launches the workbench and waits until it answers.
    pub async fn launch(&mut self) -> bool {
        info!("Launching workbench, this may take a few minutes");
        match self.client.launch_in_server_mode().await {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "Workbench launch failed");
                false
            }
        }
    }

    /// Sends a helper script and runs the statement that sets it up.
    pub async fn load_helpers(&self, script: &Path, init_statement: &str) -> bool {
        info!(script = %script.display(), "Loading helper code");
        if let Err(e) = self.client.send_script_file(script).await {
            error!(error = %e, "Helper script was not accepted");
        }
        self.command(init_statement).await
    }

    /// Sends one statement; `true` if the engine answered `<OK>`.
    pub async fn command(&self, statement: &str) -> bool {
        self.client
            .send_statement(statement)
            .await
            .is_ok_and(|reply| reply.is_ok())
    }

    /// Calls a method on a remote object, e.g. `WB.update_hfss()`.
    pub async fn invoke(&self, target: &str, method: &str, args: Vec<ScriptArg>) -> bool {
        let call = args
            .into_iter()
            .fold(ScriptCall::new(target, method), ScriptCall::arg);
        self.command(&call.to_string()).await
    }

    /// Runs the simulation of a design through the helper object.
    pub async fn analyze_design(&self, design: &str) -> bool {
        info!(design, "Simulating design");
        self.invoke(HELPER_VAR, "analyze_hfss", vec![design.into()])
            .await
    }

    /// Sets up a feedback iterator with the given number of iterations.
    pub async fn create_feedback_iterator(
        &self,
        iterations: u32,
        delta_t: f64,
        delta_d: f64,
        design: &str,
    ) -> bool {
        info!(iterations, "Creating feedback iterator");
        let ok = self
            .invoke(
                HELPER_VAR,
                "setup_iterations",
                vec![iterations.into(), delta_t.into(), delta_d.into(), design.into()],
            )
            .await;
        info!("Setup completed");
        ok
    }

    /// Removes the feedback iterator.
    pub async fn remove_feedback_iterator(&self) -> bool {
        info!("Removing feedback iterator");
        self.invoke(HELPER_VAR, "remove_iterations", Vec::new())
            .await
    }

    /// Clears the workbench message window.
    pub async fn clear_messages(&self) -> bool {
        self.command("ClearMessages()").await
    }

    /// Opens an existing project file.
    ///
    /// The forward-slash form is tried first; if the engine rejects it, the
    /// single-quoted form with escaped backslashes is sent.
    pub async fn open_project(&mut self, file: &Path) -> bool {
        let opened = self
            .with_path_fallback(file, |p| format!("Open(FilePath={p})"))
            .await;
        self.paths.set_project_file(file);

        let imported = self.command("import os").await;
        let pid = self.command("pid=os.getpid()").await;
        opened && imported && pid
    }

    /// Refreshes and saves the project under its current name.
    pub async fn save(&self) -> bool {
        let refreshed = self.command("Refresh()").await;
        let file = PathBuf::from(self.paths.fullname());
        let saved = self
            .with_path_fallback(&file, |p| format!("Save(FilePath={p}, Overwrite=True)"))
            .await;
        refreshed && saved
    }

    /// Saves the project under another name and keeps working on it.
    pub async fn save_as(&mut self, file: &Path) -> bool {
        let saved = self
            .with_path_fallback(file, |p| format!("Save(FilePath={p}, Overwrite=True)"))
            .await;
        self.paths.set_project_file(file);
        saved
    }

    /// Saves the project and closes the workbench.
    pub async fn save_and_close(&mut self) -> bool {
        let saved = self.command("Save(Overwrite=True)").await;
        self.close().await && saved
    }

    /// Closes the workbench.
    pub async fn close(&mut self) -> bool {
        info!("Closing workbench");
        match self.client.close_workbench().await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Could not close workbench");
                false
            }
        }
    }

    /// Exports all design points to a CSV file.
    ///
    /// Without a path the file goes to `<results>/<name>_out.csv`; a path
    /// without the `.csv` extension gets it appended.
    pub async fn save_data(&self, csv: Option<&Path>) -> bool {
        let target = self.data_file(csv);
        info!(file = %target, "Saving simulated data points");
        self.command(&format!(
            "Parameters.ExportAllDesignPointsData(FilePath={})",
            quoted(&target)
        ))
        .await
    }

    /// Pushes design point definitions into the remote interpreter.
    ///
    /// `values[i]` holds the variations of `variables[i]`. Variables whose
    /// first variation is not numeric are labelled: their variations are
    /// sent as indices, and the labels themselves as `labelValues`. When
    /// `script` exists it is sent afterwards to build the points.
    pub async fn create_design_points(
        &self,
        variables: &[&str],
        values: &[Vec<String>],
        create_labels: bool,
        script: Option<&Path>,
    ) -> bool {
        info!("Creating design points");
        let mut results = Vec::new();

        let input_var = ScriptArg::str_list(variables.iter().copied());
        results.push(self.command(&format!("inputVar={input_var}")).await);

        if create_labels {
            let labels = ScriptArg::str_list(
                variables
                    .iter()
                    .zip(values)
                    .filter(|(_, v)| !first_is_numeric(v))
                    .map(|(name, _)| format!("{name}Label")),
            );
            results.push(self.command(&format!("inputLabels={labels}")).await);
        }

        let var_values = ScriptArg::List(values.iter().map(|v| variation_values(v)).collect());
        results.push(self.command(&format!("varValues={var_values}")).await);

        if create_labels {
            let label_values = ScriptArg::List(
                values
                    .iter()
                    .filter(|v| !first_is_numeric(v))
                    .map(|v| ScriptArg::str_list(v.iter().map(|el| format!("'{el}'"))))
                    .collect(),
            );
            results.push(self.command(&format!("labelValues={label_values}")).await);
        }

        results.push(
            self.command(&format!("createLabels={}", ScriptArg::Bool(create_labels)))
                .await,
        );

        if let Some(script) = script.filter(|p| p.exists()) {
            if let Err(e) = self.client.send_script_file(script).await {
                error!(error = %e, "Design point script was not accepted");
            }
        }

        results.iter().all(|ok| *ok)
    }

    /// Writes the design point index for remote scripts.
    pub fn write_design_point_index(
        &self,
        path: &Path,
        variables: &[&str],
        rows: &[Vec<String>],
        materials: Option<&[String]>,
    ) -> bool {
        match design_points::write_design_point_index(path, variables, rows, materials) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Couldn't open or write the design point index");
                false
            }
        }
    }

    /// Reads an exported design point table and logs its contents.
    pub fn load_design_point_table(&self, path: &Path) -> Option<Vec<DesignPoint>> {
        match design_points::read_design_point_table(path) {
            Ok(points) => {
                design_points::log_design_points(&points);
                Some(points)
            }
            Err(e) => {
                error!(error = %e, "Error in opening csv");
                None
            }
        }
    }

    fn data_file(&self, csv: Option<&Path>) -> String {
        match csv {
            None => format!("{}/{}_out.csv", self.paths.results_dir(), self.paths.name()),
            Some(p) if p.extension().is_some_and(|e| e == "csv") => {
                crate::client::protocol::forward_slashes(&p.to_string_lossy())
            }
            Some(p) => format!(
                "{}.csv",
                crate::client::protocol::forward_slashes(&p.to_string_lossy())
            ),
        }
    }

    async fn with_path_fallback<F>(&self, file: &Path, statement: F) -> bool
    where
        F: Fn(&str) -> String,
    {
        let raw = file.to_string_lossy();
        let primary = quoted(&crate::client::protocol::forward_slashes(&raw));
        if self.command(&statement(&primary)).await {
            return true;
        }
        self.command(&statement(&single_quoted_path(&raw))).await
    }
}

fn first_is_numeric(values: &[String]) -> bool {
    values
        .first()
        .is_some_and(|v| v.trim().parse::<f64>().is_ok())
}

/// Numeric variations as strings, anything else replaced by its index among
/// the non-numeric ones.
fn variation_values(values: &[String]) -> ScriptArg {
    let mut label_index = 0usize;
    ScriptArg::List(
        values
            .iter()
            .map(|v| {
                if v.trim().parse::<f64>().is_ok() {
                    ScriptArg::Str(v.clone())
                } else {
                    let index = label_index;
                    label_index += 1;
                    ScriptArg::Str(index.to_string())
                }
            })
            .collect(),
    )
}
