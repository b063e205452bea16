pub mod notification_menu;
