/// Simple localization support for the CLI surface.
/// Locale can be selected via the `--locale` CLI flag (e.g. `--locale zh`).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl Locale {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "zh" | "zh-cn" | "zh_cn" | "zh-hans" | "zh-tw" | "zh_tw" => Self::Zh,
            _ => Self::En,
        }
    }
}

pub struct Messages {
    pub compressing: &'static str,
    pub uploading: &'static str,
    pub waiting: &'static str,
    pub saved: &'static str,
    pub failed: &'static str,
    pub error_prefix: &'static str,
}

pub static EN: Messages = Messages {
    compressing: "Compressing…",
    uploading: "uploading",
    waiting: "waiting for server",
    saved: "Saved",
    failed: "Compression failed",
    error_prefix: "ERR",
};

pub static ZH: Messages = Messages {
    compressing: "压缩中…",
    uploading: "上传中",
    waiting: "等待服务器",
    saved: "已保存",
    failed: "压缩失败",
    error_prefix: "错误",
};

pub fn get_messages(locale: Locale) -> &'static Messages {
    match locale {
        Locale::En => &EN,
        Locale::Zh => &ZH,
    }
}
