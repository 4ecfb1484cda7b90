use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};

use crate::service::purchase::CreditPackage;

pub const PACKAGE_CALLBACK_PREFIX: &str = "buy:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Home,
    Help,
    Buy,
    Balance,
    Audio,
}

impl MenuAction {
    const ALL: [MenuAction; 5] = [
        MenuAction::Home,
        MenuAction::Help,
        MenuAction::Buy,
        MenuAction::Balance,
        MenuAction::Audio,
    ];

    pub fn label(&self) -> String {
        let key = match self {
            MenuAction::Home => "buttons.main_menu.home",
            MenuAction::Help => "buttons.main_menu.help",
            MenuAction::Buy => "buttons.main_menu.buy",
            MenuAction::Balance => "buttons.main_menu.balance",
            MenuAction::Audio => "buttons.main_menu.audio",
        };
        t!(key).to_string()
    }

    /// Matches the exact text Telegram sends back when a menu button is pressed.
    pub fn from_text(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.label() == text)
    }
}

pub fn get_main_menu_keyboard() -> KeyboardMarkup {
    let button = |action: MenuAction| KeyboardButton::new(action.label());

    KeyboardMarkup::new([
        vec![button(MenuAction::Home), button(MenuAction::Help)],
        vec![button(MenuAction::Buy), button(MenuAction::Balance)],
        vec![button(MenuAction::Audio)],
    ])
    .resize_keyboard()
}

pub fn get_packages_keyboard(packages: &[CreditPackage]) -> InlineKeyboardMarkup {
    let rows = packages.iter().map(|package| {
        vec![InlineKeyboardButton::callback(
            t!("buttons.package", credits = package.credit_amount),
            format!("{}{}", PACKAGE_CALLBACK_PREFIX, package.package_id),
        )]
    });

    InlineKeyboardMarkup::new(rows)
}
