//! Integration tests for the statements a session sends to the workbench.

mod common;

use std::path::Path;
use std::time::Duration;

use common::{closed_port, StubServer};
use wb_bridge::client::protocol::EXIT_COMMAND;
use wb_bridge::client::{BridgeError, Reply, WorkbenchClient};
use wb_bridge::session::{ProjectPaths, WorkbenchSession};

fn session_for(server: &StubServer, project: &str) -> WorkbenchSession {
    let client = WorkbenchClient::new("127.0.0.1", server.port)
        .with_exit_grace(Duration::from_millis(50));
    WorkbenchSession::new(client, ProjectPaths::new(project))
}

// =============================================================================
// Client Exchange Tests
// =============================================================================

#[tokio::test]
async fn statement_round_trip_is_byte_exact() {
    let server = StubServer::start(&["<OK>", "Traceback: NameError"], "<OK>").await;
    let client = WorkbenchClient::new("127.0.0.1", server.port);

    let ok = client.send_statement("x = \"ä\"").await.unwrap();
    let failed = client.send_statement("undefined_call()").await.unwrap();

    assert_eq!(ok, Reply::Ok);
    assert_eq!(failed, Reply::Failed("Traceback: NameError".to_string()));
    assert_eq!(server.received(), ["x = \"ä\"", "undefined_call()"]);
}

#[tokio::test]
async fn ok_with_trailing_text_is_a_failure() {
    let server = StubServer::start(&["<OK>\n"], "<OK>").await;
    let client = WorkbenchClient::new("127.0.0.1", server.port);

    let reply = client.send_statement("Refresh()").await.unwrap();
    assert!(!reply.is_ok());
}

#[tokio::test]
async fn unreachable_server_is_a_connect_error() {
    let client = WorkbenchClient::new("127.0.0.1", closed_port().await);

    let err = client.send_statement("Refresh()").await.unwrap_err();
    assert!(err.is_connect());
}

#[tokio::test]
async fn variable_query_strips_name() {
    let server = StubServer::start(&["pid=4242"], "<OK>").await;
    let client = WorkbenchClient::new("127.0.0.1", server.port);

    let value = client.get_variable_value("pid").await.unwrap();

    assert_eq!(value.as_deref(), Some("4242"));
    assert_eq!(server.received(), ["Query,pid"]);
}

#[tokio::test]
async fn script_file_is_sent_on_one_connection() {
    let server = StubServer::accepting().await;
    let client = WorkbenchClient::new("127.0.0.1", server.port);

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("helpers.py");
    let source = "import os\nclass WB:\n    pass\nwb = WB()";
    std::fs::write(&script, source).unwrap();

    client.send_script_file(&script).await.unwrap();

    assert_eq!(server.received(), [source]);
}

#[tokio::test]
async fn rejected_script_file_is_an_error() {
    let server = StubServer::start(&["SyntaxError: invalid syntax"], "<OK>").await;
    let client = WorkbenchClient::new("127.0.0.1", server.port);

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("broken.py");
    std::fs::write(&script, "def (:\n").unwrap();

    let err = client.send_script_file(&script).await.unwrap_err();
    assert!(matches!(err, BridgeError::TransmissionFailed { .. }));
}

#[tokio::test]
async fn missing_script_file_is_an_error() {
    let server = StubServer::accepting().await;
    let client = WorkbenchClient::new("127.0.0.1", server.port);

    let err = client
        .send_script_file(Path::new("/no/such/script.py"))
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::ScriptRead { .. }));
    assert!(server.received().is_empty());
}

// =============================================================================
// Session Tests
// =============================================================================

#[tokio::test]
async fn open_project_falls_back_to_single_quotes() {
    let server = StubServer::start(&["Error: file not found"], "<OK>").await;
    let mut session = session_for(&server, "/tmp/old.wbpj");

    assert!(session.open_project(Path::new(r"C:\work\Antenna.wbpj")).await);

    assert_eq!(
        server.received(),
        [
            r#"Open(FilePath="C:/work/Antenna.wbpj")"#,
            r"Open(FilePath='C:\\work\\Antenna.wbpj')",
            "import os",
            "pid=os.getpid()",
        ]
    );
    assert_eq!(session.paths().name(), "Antenna");
}

#[tokio::test]
async fn save_refreshes_first() {
    let server = StubServer::accepting().await;
    let session = session_for(&server, "/work/Antenna.wbpj");

    assert!(session.save().await);

    assert_eq!(
        server.received(),
        [
            "Refresh()",
            r#"Save(FilePath="/work/Antenna.wbpj", Overwrite=True)"#,
        ]
    );
}

#[tokio::test]
async fn save_data_defaults_to_results_dir() {
    let server = StubServer::accepting().await;
    let session = session_for(&server, "/work/Antenna.wbpj");

    assert!(session.save_data(None).await);
    assert!(session.save_data(Some(Path::new("/tmp/sweep"))).await);

    assert_eq!(
        server.received(),
        [
            r#"Parameters.ExportAllDesignPointsData(FilePath="/work/Antenna_Results/Antenna_out.csv")"#,
            r#"Parameters.ExportAllDesignPointsData(FilePath="/tmp/sweep.csv")"#,
        ]
    );
}

#[tokio::test]
async fn design_points_with_labels() {
    let server = StubServer::accepting().await;
    let session = session_for(&server, "/work/Antenna.wbpj");

    let values = vec![
        vec!["1".to_string(), "2".to_string()],
        vec!["copper".to_string(), "gold".to_string()],
    ];
    assert!(
        session
            .create_design_points(&["length", "material"], &values, true, None)
            .await
    );

    assert_eq!(
        server.received(),
        [
            r#"inputVar=["length", "material"]"#,
            r#"inputLabels=["materialLabel"]"#,
            r#"varValues=[["1", "2"], ["0", "1"]]"#,
            r#"labelValues=[["'copper'", "'gold'"]]"#,
            "createLabels=True",
        ]
    );
}

#[tokio::test]
async fn helper_calls_render_positional_args() {
    let server = StubServer::accepting().await;
    let session = session_for(&server, "/work/Antenna.wbpj");

    assert!(session.analyze_design("HFSSDesign1").await);
    assert!(
        session
            .create_feedback_iterator(4, 0.5, 1.0, "HFSSDesign1")
            .await
    );
    assert!(session.remove_feedback_iterator().await);
    assert!(session.clear_messages().await);

    assert_eq!(
        server.received(),
        [
            r#"WB.analyze_hfss("HFSSDesign1")"#,
            r#"WB.setup_iterations(4,0.5,1.0,"HFSSDesign1")"#,
            "WB.remove_iterations()",
            "ClearMessages()",
        ]
    );
}

#[tokio::test]
async fn failed_command_reports_false() {
    let server = StubServer::start(&["Error"], "<OK>").await;
    let session = session_for(&server, "/work/Antenna.wbpj");

    assert!(!session.clear_messages().await);
    assert!(session.clear_messages().await);
}

#[tokio::test]
async fn save_and_close_sends_exit() {
    let server = StubServer::accepting().await;
    let mut session = session_for(&server, "/work/Antenna.wbpj");

    assert!(session.save_and_close().await);

    assert_eq!(server.received(), ["Save(Overwrite=True)", EXIT_COMMAND]);
}

#[tokio::test]
async fn design_point_table_round_trip_through_session() {
    let server = StubServer::accepting().await;
    let session = session_for(&server, "/work/Antenna.wbpj");
    let dir = tempfile::tempdir().unwrap();

    let index = dir.path().join("index.csv");
    assert!(session.write_design_point_index(
        &index,
        &["length"],
        &[vec!["1.5".to_string()]],
        None
    ));
    assert_eq!(std::fs::read_to_string(&index).unwrap(), "ID,length\n1,1.5\n");

    let missing = dir.path().join("missing.csv");
    assert!(session.load_design_point_table(&missing).is_none());
}
