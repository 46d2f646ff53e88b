use super::AppState;
use crate::db::models::Project;
use crate::error::Result;

pub async fn list_projects(state: &AppState) -> Result<Vec<Project>> {
    Ok(state.workspace()?.projects().to_vec())
}

pub async fn create_project(
    state: &AppState,
    name: String,
    description: Option<String>,
) -> Result<Project> {
    let mut ws = state.workspace()?;
    ws.create_project(&name, description.as_deref()).await
}

pub async fn delete_project(state: &AppState, id: String) -> Result<()> {
    state.workspace()?.delete_project(&id).await
}

/// File a session under a project, or pass `None` to unfile it.
pub async fn link_session(
    state: &AppState,
    session_id: String,
    project_id: Option<String>,
) -> Result<()> {
    let mut ws = state.workspace()?;
    ws.link_session(&session_id, project_id.as_deref()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::chat::{active_session, list_sessions};
    use crate::commands::test_support::signed_in;
    use crate::llm::testing::ScriptedRelay;

    #[tokio::test]
    async fn project_lifecycle() {
        let state = signed_in(ScriptedRelay::default()).await;
        let project = create_project(&state, "Thesis".into(), None).await.unwrap();
        assert_eq!(list_projects(&state).await.unwrap(), vec![project.clone()]);

        let session = active_session(&state).await.unwrap();
        link_session(&state, session.id.clone(), Some(project.id.clone()))
            .await
            .unwrap();
        assert_eq!(
            active_session(&state).await.unwrap().project_id,
            Some(project.id.clone())
        );

        delete_project(&state, project.id).await.unwrap();
        assert!(list_projects(&state).await.unwrap().is_empty());
        assert!(list_sessions(&state)
            .await
            .unwrap()
            .iter()
            .all(|s| s.project_id.is_none()));
    }
}
