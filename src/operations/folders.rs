use super::{Operations, folder_arg, message, to_value};
use crate::arguments::Arguments;
use crate::registry::OperationResult;
use serde_json::json;
use std::sync::Arc;

impl Operations {
    pub(super) async fn list_containers(self: Arc<Self>, args: Arguments) -> OperationResult {
        let mut session = self.open(&args).await?;
        let result = session.list_containers().await;
        session.logout().await;
        to_value(&result?)
    }

    pub(super) async fn select_folder(self: Arc<Self>, args: Arguments) -> OperationResult {
        let folder = folder_arg(&args)?;
        let mut session = self.open(&args).await?;
        let result = session.select_container(&folder).await;
        session.logout().await;
        let status = result?;
        Ok(json!({
            "message": format!("Folder '{}' selected.", status.folder),
            "folder": status.folder,
            "exists": status.exists,
            "recent": status.recent,
            "uid_validity": status.uid_validity,
        }))
    }

    pub(super) async fn create_folder(self: Arc<Self>, args: Arguments) -> OperationResult {
        let name = args.required_string("folder_name")?;
        let mut session = self.open(&args).await?;
        let result = session.create_container(&name).await;
        session.logout().await;
        result?;
        Ok(message(format!("Folder '{name}' created successfully.")))
    }

    pub(super) async fn delete_folder(self: Arc<Self>, args: Arguments) -> OperationResult {
        let name = args.required_string("folder_name")?;
        let mut session = self.open(&args).await?;
        let result = session.delete_container(&name).await;
        session.logout().await;
        result?;
        Ok(message(format!("Folder '{name}' deleted successfully.")))
    }

    pub(super) async fn rename_folder(self: Arc<Self>, args: Arguments) -> OperationResult {
        args.require(&["old_name", "new_name"])?;
        let old_name = args.required_string("old_name")?;
        let new_name = args.required_string("new_name")?;
        let mut session = self.open(&args).await?;
        let result = session.rename_container(&old_name, &new_name).await;
        session.logout().await;
        result?;
        Ok(message(format!(
            "Folder '{old_name}' renamed to '{new_name}' successfully."
        )))
    }
}
