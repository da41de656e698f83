/*!
 * Database module for the translation event queue and content tables.
 *
 * This module provides SQLite-based persistence for:
 * - Translation events with lease-based claiming
 * - Recipes, steps, ingredients, food master rows and log posts
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

// Re-export main types
pub use connection::DatabaseConnection;
pub use repository::Repository;
