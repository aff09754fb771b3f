pub mod anti_fraud;
pub mod home;
pub mod services;

pub use anti_fraud::TipScreen;
pub use home::{Contact, Dashboard};
pub use services::ServicesScreen;

use crate::places::ServiceKind;

/// Who `call <id>` dials: a family contact by id, else an emergency line by number
pub fn resolve_callee(dashboard: &Dashboard, id: &str) -> Option<Contact> {
    dashboard
        .contact(id)
        .cloned()
        .or_else(|| anti_fraud::emergency_contact(id))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Home,
    Voice,
    Services,
    Education,
}

impl Tab {
    /// Classify a route the way the navigation bar highlights it
    pub fn from_path(path: &str) -> Self {
        if path.contains("voice") {
            Tab::Voice
        } else if path.contains("services") {
            Tab::Services
        } else if path.contains("education") {
            Tab::Education
        } else {
            Tab::Home
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Tab::Home => "/",
            Tab::Voice => "/voice",
            Tab::Services => "/services",
            Tab::Education => "/education",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Home => "首页",
            Tab::Voice => "语音助手",
            Tab::Services => "附近服务",
            Tab::Education => "防骗课堂",
        }
    }
}

/// One line typed on the terminal
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Home,
    Voice,
    Services(Option<ServiceKind>),
    Tips { next: bool },
    Remind(String),
    Call(String),
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err("请输入命令，输入 help 查看帮助".to_string());
        };
        let arg = words.next();

        match head.to_lowercase().as_str() {
            "home" | "h" => Ok(Command::Home),
            "voice" | "v" => Ok(Command::Voice),
            "services" | "s" => match arg {
                None => Ok(Command::Services(None)),
                Some(name) => ServiceKind::parse(name)
                    .map(|kind| Command::Services(Some(kind)))
                    .ok_or_else(|| format!("未知服务: {}（可选 market / hospital）", name)),
            },
            "tips" | "education" | "t" => Ok(Command::Tips {
                next: arg.is_some_and(|a| a == "next" || a == "换一条"),
            }),
            "remind" | "r" => arg
                .map(|id| Command::Remind(id.to_string()))
                .ok_or_else(|| "用法: remind <编号>".to_string()),
            "call" | "c" => arg
                .map(|id| Command::Call(id.to_string()))
                .ok_or_else(|| "用法: call <编号>".to_string()),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(format!("未知命令: {}，输入 help 查看帮助", other)),
        }
    }

    pub fn tab(&self) -> Option<Tab> {
        match self {
            // Emergency lines are dialled from whichever screen lists them
            Command::Call(id) if anti_fraud::emergency_contact(id).is_some() => None,
            Command::Home | Command::Remind(_) | Command::Call(_) => Some(Tab::Home),
            Command::Voice => Some(Tab::Voice),
            Command::Services(_) => Some(Tab::Services),
            Command::Tips { .. } => Some(Tab::Education),
            Command::Help | Command::Quit => None,
        }
    }
}

pub const HELP: &str = "\
命令:
  home                 首页
  voice                开始/结束语音对话
  services market      查找附近菜市场
  services hospital    查找附近医院
  tips [next]          防诈骗知识（next 换一条）
  remind <编号>        开关提醒
  call <编号>          拨打亲情电话
  call 110 / 96110     拨打报警电话 / 反诈中心
  quit                 退出";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_from_path() {
        assert_eq!(Tab::from_path("/voice"), Tab::Voice);
        assert_eq!(Tab::from_path("#/services?x=1"), Tab::Services);
        assert_eq!(Tab::from_path("/education"), Tab::Education);
        assert_eq!(Tab::from_path("/"), Tab::Home);
        assert_eq!(Tab::from_path("/unknown"), Tab::Home);
    }

    #[test]
    fn test_tab_paths_round_trip() {
        for tab in [Tab::Home, Tab::Voice, Tab::Services, Tab::Education] {
            assert_eq!(Tab::from_path(tab.path()), tab);
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("voice"), Ok(Command::Voice));
        assert_eq!(
            Command::parse("services hospital"),
            Ok(Command::Services(Some(ServiceKind::Hospital)))
        );
        assert_eq!(Command::parse("  s  "), Ok(Command::Services(None)));
        assert_eq!(Command::parse("tips next"), Ok(Command::Tips { next: true }));
        assert_eq!(Command::parse("tips"), Ok(Command::Tips { next: false }));
        assert_eq!(Command::parse("remind 2"), Ok(Command::Remind("2".into())));
        assert_eq!(Command::parse("QUIT"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Command::parse("").is_err());
        assert!(Command::parse("call").is_err());
        assert!(Command::parse("services bank").is_err());
        assert!(Command::parse("dance").is_err());
    }

    #[test]
    fn test_resolve_callee() {
        let dashboard = Dashboard::default();
        assert_eq!(resolve_callee(&dashboard, "3").unwrap().name, "老伴");

        let police = resolve_callee(&dashboard, "110").unwrap();
        assert_eq!(Dashboard::call_link(&police), "tel:110");
        assert_eq!(resolve_callee(&dashboard, "96110").unwrap().name, "反诈中心");

        assert!(resolve_callee(&dashboard, "7").is_none());
    }

    #[test]
    fn test_command_tabs() {
        assert_eq!(Command::Call("1".into()).tab(), Some(Tab::Home));
        assert_eq!(Command::Call("96110".into()).tab(), None);
        assert_eq!(Command::Tips { next: true }.tab(), Some(Tab::Education));
        assert_eq!(Command::Help.tab(), None);
    }
}
