use crate::action_executor::run_shell_detached;
use crate::model::{ResultItem, TAG_SYSTEM};
use crate::provider::{Provider, ProviderError};
use crate::search::rank_by_score;

pub const DEFAULT_SYSTEM_RESULT_LIMIT: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemAction {
    pub title: &'static str,
    pub subtitle: &'static str,
    pub icon: &'static str,
    pub command: &'static str,
}

impl SystemAction {
    fn to_item(self) -> ResultItem {
        ResultItem::new(self.title, self.subtitle, self.icon, self.command, TAG_SYSTEM)
    }
}

pub fn system_actions() -> &'static [SystemAction] {
    &[
        SystemAction {
            title: "Shutdown",
            subtitle: "Power off the system",
            icon: "system-shutdown",
            command: "shutdown -h now",
        },
        SystemAction {
            title: "Restart",
            subtitle: "Restart the system",
            icon: "system-reboot",
            command: "reboot",
        },
        SystemAction {
            title: "Log Out",
            subtitle: "Log out of current session",
            icon: "system-log-out",
            command: "pkill -KILL -u $USER",
        },
        SystemAction {
            title: "Lock Screen",
            subtitle: "Lock the screen",
            icon: "system-lock-screen",
            command: "loginctl lock-session",
        },
        SystemAction {
            title: "Sleep",
            subtitle: "Put system to sleep",
            icon: "system-suspend",
            command: "systemctl suspend",
        },
        SystemAction {
            title: "File Manager",
            subtitle: "Open file manager",
            icon: "folder",
            command: "xdg-open ~",
        },
        SystemAction {
            title: "Terminal",
            subtitle: "Open terminal",
            icon: "utilities-terminal",
            command: "x-terminal-emulator",
        },
        SystemAction {
            title: "Settings",
            subtitle: "Open system settings",
            icon: "preferences-system",
            command: "gnome-control-center",
        },
    ]
}

pub fn search_actions(query: &str, limit: usize) -> Vec<SystemAction> {
    let actions = system_actions();
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return actions.iter().take(limit).copied().collect();
    }
    rank_by_score(actions, &query, limit, |action| action.title)
}

pub struct SystemCommandProvider {
    limit: usize,
}

impl SystemCommandProvider {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl Default for SystemCommandProvider {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_RESULT_LIMIT)
    }
}

impl Provider for SystemCommandProvider {
    fn name(&self) -> &str {
        "System"
    }

    fn icon(&self) -> &str {
        "preferences-system"
    }

    fn search(&mut self, query: &str) -> Result<Vec<ResultItem>, ProviderError> {
        Ok(search_actions(query, self.limit)
            .into_iter()
            .map(SystemAction::to_item)
            .collect())
    }

    fn execute(&mut self, item: &ResultItem) -> Result<(), ProviderError> {
        if !system_actions().iter().any(|a| a.command == item.payload) {
            return Err(ProviderError::ItemNotFound(item.title.clone()));
        }
        run_shell_detached(&item.payload)?;
        Ok(())
    }
}
