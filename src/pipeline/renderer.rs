use chrono::{DateTime, Local, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Url;
use serde::Serialize;

use crate::core::error::NinaError;
use crate::core::types::{MessageType, NormalizedAlert, SentTime, Severity};

/// Display-ready form of one alert.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AlertDisplay {
    pub severity: Severity,
    pub severity_class: &'static str,
    pub type_label: String,
    pub headline: String,
    pub area: String,
    pub time: String,
    pub description: String,
    pub detail_link: String,
    pub distance: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SeveritySummary {
    pub extreme: usize,
    pub severe: usize,
    pub moderate: usize,
    pub minor: usize,
}

impl SeveritySummary {
    pub fn from_alerts(alerts: &[NormalizedAlert]) -> Self {
        let mut summary = Self::default();
        for alert in alerts {
            match alert.severity {
                Severity::Extreme => summary.extreme += 1,
                Severity::Severe => summary.severe += 1,
                Severity::Moderate => summary.moderate += 1,
                Severity::Minor => summary.minor += 1,
            }
        }
        summary
    }

    pub fn count(&self, severity: Severity) -> usize {
        match severity {
            Severity::Extreme => self.extreme,
            Severity::Severe => self.severe,
            Severity::Moderate => self.moderate,
            Severity::Minor => self.minor,
        }
    }

    pub fn total(&self) -> usize {
        self.extreme + self.severe + self.moderate + self.minor
    }
}

/// What the panel shows at a given moment.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PanelView {
    Loading,
    Populated {
        alerts: Vec<AlertDisplay>,
        summary: SeveritySummary,
    },
    Empty,
    Errored {
        message: String,
    },
}

pub const LOADING_TEXT: &str = "Lade Warnmeldungen...";
pub const EMPTY_TEXT: &str = "Keine aktuellen Warnmeldungen";
pub const ERROR_PREFIX: &str = "Fehler beim Laden der Warnmeldungen";

pub struct Renderer {
    web_base: String,
}

impl Renderer {
    pub fn new(web_base: impl Into<String>) -> Self {
        Self {
            web_base: web_base.into(),
        }
    }

    /// Builds the settled view for one cycle's processed alerts.
    pub fn render(
        &self,
        alerts: &[NormalizedAlert],
        now: DateTime<Utc>,
    ) -> Result<PanelView, NinaError> {
        if alerts.is_empty() {
            return Ok(PanelView::Empty);
        }
        let displays = alerts
            .iter()
            .map(|a| self.display(a, now))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PanelView::Populated {
            alerts: displays,
            summary: SeveritySummary::from_alerts(alerts),
        })
    }

    pub fn display(
        &self,
        alert: &NormalizedAlert,
        now: DateTime<Utc>,
    ) -> Result<AlertDisplay, NinaError> {
        Ok(AlertDisplay {
            severity: alert.severity,
            severity_class: severity_class(alert.severity),
            type_label: type_label(&alert.message_type),
            headline: alert.headline.clone(),
            area: alert.area_description.clone(),
            time: format_sent(&alert.sent, now),
            description: alert.description.clone(),
            detail_link: self.detail_link(&alert.id)?,
            distance: alert.distance_km.map(|d| format!("{:.1} km", d)),
        })
    }

    pub fn detail_link(&self, id: &str) -> Result<String, NinaError> {
        let mut url = Url::parse(&self.web_base)
            .map_err(|e| NinaError::Config(format!("web_base: {}", e)))?;
        url.set_query(None);
        url.set_fragment(None);
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| NinaError::Config("web_base cannot carry a path".into()))?;
            segments.pop_if_empty();
            segments.push(if id.is_empty() { "meldungen" } else { "meldung" });
        }
        let mut link = String::from(url);
        if !id.is_empty() {
            // Appended as text so `.` and `..` ids are not folded away.
            link.push('/');
            link.extend(utf8_percent_encode(id, ID_COMPONENT));
        }
        Ok(link)
    }
}

/// Everything but `A-Z a-z 0-9 - _ . ! ~ * ' ( )` is escaped in an id.
const ID_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn severity_class(severity: Severity) -> &'static str {
    match severity {
        Severity::Minor => "severity-minor",
        Severity::Moderate => "severity-moderate",
        Severity::Severe => "severity-severe",
        Severity::Extreme => "severity-extreme",
    }
}

pub fn type_label(message_type: &MessageType) -> String {
    match message_type {
        MessageType::Alert => "Warnung".to_string(),
        MessageType::Update => "Aktualisierung".to_string(),
        MessageType::Cancel => "Aufhebung".to_string(),
        MessageType::Test => "Test".to_string(),
        MessageType::Unknown(raw) => raw.clone(),
    }
}

/// Local `dd.mm.yyyy, HH:MM`; a missing time shows the render time.
pub fn format_sent(sent: &SentTime, now: DateTime<Utc>) -> String {
    let format = |dt: &DateTime<Utc>| {
        dt.with_timezone(&Local)
            .format("%d.%m.%Y, %H:%M")
            .to_string()
    };
    match sent {
        SentTime::At(dt) => format(dt),
        SentTime::Missing => format(&now),
        SentTime::Invalid(raw) => raw.clone(),
    }
}

pub fn render_html(view: &PanelView) -> String {
    match view {
        PanelView::Loading => format!("<div class=\"nina-loading\">{}</div>", LOADING_TEXT),
        PanelView::Empty => format!("<div class=\"nina-no-warnings\">{}</div>", EMPTY_TEXT),
        PanelView::Errored { message } => format!(
            "<div class=\"nina-error\">{}: {}</div>",
            ERROR_PREFIX,
            escape_html(message)
        ),
        PanelView::Populated { alerts, summary } => {
            let mut out = String::new();
            out.push_str("<div class=\"nina-summary\">");
            for severity in Severity::ALL {
                out.push_str(&format!(
                    "<span class=\"{}\">{}: {}</span>",
                    severity_class(severity),
                    severity.as_str(),
                    summary.count(severity)
                ));
            }
            out.push_str("</div>\n");
            for alert in alerts {
                out.push_str(&alert_html(alert));
            }
            out
        }
    }
}

fn alert_html(alert: &AlertDisplay) -> String {
    let distance = alert
        .distance
        .as_ref()
        .map(|d| format!("<div class=\"nina-warning-distance\">{}</div>", escape_html(d)))
        .unwrap_or_default();
    format!(
        "<div class=\"nina-warning {class}\">\
<div class=\"nina-warning-type\">{kind}</div>\
<div class=\"nina-warning-header\">{headline}</div>\
<div class=\"nina-warning-area\">📍 {area}</div>\
{distance}\
<div class=\"nina-warning-time\">🕒 {time}</div>\
<div class=\"nina-warning-description\">{description}</div>\
<a href=\"{link}\" target=\"_blank\" class=\"nina-warning-link\">Weitere Details →</a>\
</div>\n",
        class = alert.severity_class,
        kind = escape_html(&alert.type_label),
        headline = escape_html(&alert.headline),
        area = escape_html(&alert.area),
        distance = distance,
        time = escape_html(&alert.time),
        description = escape_html(&alert.description),
        link = escape_html(&alert.detail_link),
    )
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
