use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub id: String,
    pub title: String,
    pub time: String,
    pub active: bool,
}

const HEADER: &str = "夕阳红老年助手";

/// Headline figure on the health card; the series below is only the chart
const TODAY_STEPS: &str = "6,432";

/// Step counts shown on the health card
const STEP_SERIES: [(&str, u32); 6] = [
    ("0", 100),
    ("20", 400),
    ("40", 300),
    ("60", 800),
    ("80", 200),
    ("20", 100),
];

const BAR_WIDTH: u32 = 20;

/// Home screen: health card, family contacts, daily reminders
pub struct Dashboard {
    contacts: Vec<Contact>,
    reminders: Vec<Reminder>,
}

impl Default for Dashboard {
    fn default() -> Self {
        let contact = |id: &str, name: &str, phone: &str| Contact {
            id: id.to_string(),
            name: name.to_string(),
            phone: phone.to_string(),
        };
        let reminder = |id: &str, title: &str, time: &str| Reminder {
            id: id.to_string(),
            title: title.to_string(),
            time: time.to_string(),
            active: true,
        };

        Self {
            contacts: vec![
                contact("1", "儿子", "13800000001"),
                contact("2", "女儿", "13800000002"),
                contact("3", "老伴", "13800000003"),
            ],
            reminders: vec![
                reminder("1", "降压药", "08:00"),
                reminder("2", "散步", "18:00"),
            ],
        }
    }
}

impl Dashboard {
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn reminders(&self) -> &[Reminder] {
        &self.reminders
    }

    /// Flip a reminder on or off. Returns the new state, or None for an unknown id.
    pub fn toggle_reminder(&mut self, id: &str) -> Option<bool> {
        let reminder = self.reminders.iter_mut().find(|r| r.id == id)?;
        reminder.active = !reminder.active;
        Some(reminder.active)
    }

    pub fn contact(&self, id: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.id == id)
    }

    pub fn call_link(contact: &Contact) -> String {
        format!("tel:{}", contact.phone)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let peak = STEP_SERIES.iter().map(|(_, s)| *s).max().unwrap_or(1);

        let _ = writeln!(out, "{}", HEADER);
        let _ = writeln!(out, "== 健康卡片 ==  今日步数 {}", TODAY_STEPS);
        for (label, steps) in STEP_SERIES {
            let width = (steps * BAR_WIDTH).div_ceil(peak) as usize;
            let _ = writeln!(out, "{:>3} {}", label, "█".repeat(width));
        }

        let _ = writeln!(out, "== 亲情电话 ==");
        for contact in &self.contacts {
            let _ = writeln!(out, "[{}] {}  {}", contact.id, contact.name, contact.phone);
        }

        let _ = writeln!(out, "== 提醒 ==");
        for reminder in &self.reminders {
            let state = if reminder.active { "开" } else { "关" };
            let _ = writeln!(
                out,
                "[{}] {} {}  ({})",
                reminder.id, reminder.time, reminder.title, state
            );
        }
        out
    }
}
