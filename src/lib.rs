//! Laradev editor - headless workbench for remote Laravel project files
//!
//! This crate lets a client browse, open, edit and save the files a Laravel
//! backend exposes (models and their migrations, Blade templates, scripts and
//! core PHP files) and trigger table operations on the backend. A single
//! editing widget is kept in step with a multi-tab workspace, unsaved drafts
//! and remote requests that may race or fail.

pub mod actions;
pub mod config;
pub mod file_ref;
pub mod gateway;
pub mod keymap;
pub mod lifecycle;
pub mod notify;
pub mod project;
pub mod store;
pub mod widget;
pub mod workspace;
