use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ko,
    En,
    Ja,
    Zh,
}

pub const DEFAULT_LANGUAGE: Language = Language::En;

/// User-visible strings for one language.
#[derive(Debug, PartialEq, Eq)]
pub struct Translations {
    pub price: &'static str,
    pub change: &'static str,
    pub last_updated: &'static str,
    pub greeting: &'static str,
    pub no_response: &'static str,
    pub engine_unavailable: &'static str,
    pub ai_unavailable: &'static str,
    pub component_ack: &'static str,
    pub image_failure: &'static str,
    pub activation_prompt: &'static str,
    pub deactivation_done: &'static str,
    pub everyone: &'static str,
    pub here: &'static str,
    pub terms_label: &'static str,
    pub privacy_label: &'static str,
    /// `chrono` format string used for timestamps shown to users.
    pub date_time_pattern: &'static str,
}

static KO: Translations = Translations {
    price: "가격",
    change: "변동",
    last_updated: "마지막 업데이트",
    greeting: "안녕! 난 다빈이야.",
    no_response: "응답을 생성하지 못했어요.",
    engine_unavailable: "죄송합니다. 지금은 요청을 처리할 수 없습니다.",
    ai_unavailable: "죄송합니다. 현재 AI 기능에 문제가 있습니다.",
    component_ack: "Hello from component interaction! 👋",
    image_failure: "이미지를 만들지 못했어요.",
    activation_prompt: "아래 링크에서 계정을 연결해 주세요.",
    deactivation_done: "계정 연결이 해제되었습니다.",
    everyone: "모두",
    here: "여기있는사람들",
    terms_label: "이용약관",
    privacy_label: "개인정보처리방침",
    date_time_pattern: "%Y. %-m. %-d. %H:%M",
};

static EN: Translations = Translations {
    price: "Price",
    change: "Change",
    last_updated: "Last Updated",
    greeting: "Hi! I'm Dabini.",
    no_response: "I couldn't generate a response.",
    engine_unavailable: "Sorry. I can't process your request right now.",
    ai_unavailable: "Sorry, the AI features are currently unavailable.",
    component_ack: "Hello from component interaction! 👋",
    image_failure: "I couldn't create the image.",
    activation_prompt: "Link your account using the link below.",
    deactivation_done: "Your account has been unlinked.",
    everyone: "everyone",
    here: "everyone here",
    terms_label: "Terms of Service",
    privacy_label: "Privacy Policy",
    date_time_pattern: "%-m/%-d/%Y, %-I:%M %p",
};

static JA: Translations = Translations {
    price: "価格",
    change: "変動",
    last_updated: "最終更新",
    greeting: "こんにちは！ダビニです。",
    no_response: "応答を生成できませんでした。",
    engine_unavailable: "申し訳ありません。現在リクエストを処理できません。",
    ai_unavailable: "申し訳ありません。現在AI機能に問題があります。",
    component_ack: "Hello from component interaction! 👋",
    image_failure: "画像を作成できませんでした。",
    activation_prompt: "以下のリンクからアカウントを連携してください。",
    deactivation_done: "アカウントの連携を解除しました。",
    everyone: "みんな",
    here: "ここにいる人たち",
    terms_label: "利用規約",
    privacy_label: "プライバシーポリシー",
    date_time_pattern: "%Y/%-m/%-d %H:%M",
};

static ZH: Translations = Translations {
    price: "价格",
    change: "变动",
    last_updated: "最后更新",
    greeting: "你好！我是Dabini。",
    no_response: "无法生成回复。",
    engine_unavailable: "抱歉，目前无法处理您的请求。",
    ai_unavailable: "抱歉，AI功能目前出现问题。",
    component_ack: "Hello from component interaction! 👋",
    image_failure: "无法生成图片。",
    activation_prompt: "请通过以下链接关联您的账户。",
    deactivation_done: "您的账户已解除关联。",
    everyone: "所有人",
    here: "在场的人",
    terms_label: "服务条款",
    privacy_label: "隐私政策",
    date_time_pattern: "%Y/%-m/%-d %H:%M",
};

impl Language {
    /// Resolves a BCP-47 style tag (`en-US`, `ko`, `zh-CN`) by its primary subtag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let primary = tag.split(&['-', '_'][..]).next().unwrap_or_default();
        match primary.trim().to_ascii_lowercase().as_str() {
            "ko" => Some(Self::Ko),
            "en" => Some(Self::En),
            "ja" => Some(Self::Ja),
            "zh" => Some(Self::Zh),
            _ => None,
        }
    }

    pub fn translations(self) -> &'static Translations {
        match self {
            Self::Ko => &KO,
            Self::En => &EN,
            Self::Ja => &JA,
            Self::Zh => &ZH,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Ko => "ko",
            Self::En => "en",
            Self::Ja => "ja",
            Self::Zh => "zh",
        }
    }
}

/// Picks the language for `locale`, falling back to `default` and then to English.
pub fn resolve(locale: Option<&str>, default: &str) -> Language {
    locale
        .and_then(Language::from_tag)
        .or_else(|| Language::from_tag(default))
        .unwrap_or(DEFAULT_LANGUAGE)
}

pub fn for_locale(locale: Option<&str>) -> &'static Translations {
    resolve(locale, DEFAULT_LANGUAGE.code()).translations()
}
