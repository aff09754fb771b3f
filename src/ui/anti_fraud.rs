use super::home::Contact;
use crate::genai::TextGenerator;
use std::fmt::Write as _;

const TIP_PROMPT: &str = "给老年人讲一条简短的防电信诈骗知识，语言要通俗易懂，大白话，不超过100字。包含一个具体的诈骗场景（如'假冒孙子'或'保健品'）。";

/// Numbers listed under 常用紧急电话
pub const EMERGENCY_NUMBERS: [(&str, &str); 2] = [("110", "报警电话"), ("96110", "反诈中心")];

/// Emergency line for `number`, shaped like a contact so it dials the same way
pub fn emergency_contact(number: &str) -> Option<Contact> {
    EMERGENCY_NUMBERS
        .iter()
        .find(|(phone, _)| *phone == number)
        .map(|(phone, label)| Contact {
            id: phone.to_string(),
            name: label.to_string(),
            phone: phone.to_string(),
        })
}

/// Anti-fraud tip card
pub struct TipScreen {
    tip: String,
    loading: bool,
}

impl Default for TipScreen {
    fn default() -> Self {
        Self {
            tip: "正在获取最新防诈骗知识...".to_string(),
            loading: false,
        }
    }
}

impl TipScreen {
    pub fn tip(&self) -> &str {
        &self.tip
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Fetch a fresh tip; also what "换一条" does
    pub async fn fetch(&mut self, generator: &dyn TextGenerator) {
        self.loading = true;
        self.tip = match generator.generate(TIP_PROMPT).await {
            Ok(text) if text.trim().is_empty() => "暂无内容".to_string(),
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::error!("Failed to fetch tip: {}", e);
                e.user_message().to_string()
            }
        };
        self.loading = false;
    }

    pub fn render(&self) -> String {
        let body = if self.loading { "加载中..." } else { &self.tip };
        let mut out = format!("== 防骗小课堂 ==\n{}\n(输入 tips next 换一条)\n", body);

        let _ = writeln!(out, "== 常用紧急电话 ==");
        for (phone, label) in EMERGENCY_NUMBERS {
            let _ = writeln!(out, "{}  {}  (call {})", phone, label, phone);
        }
        out
    }
}
