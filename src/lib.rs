// ==============================================================================
// lib.rs - Zimbabwe Cohort Variant Prioritisation Library
// ==============================================================================
// Description: Library interface for population-aware variant prioritisation
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

pub mod audit;
pub mod classify;
pub mod config;
pub mod models;
pub mod output;
pub mod parsers;
pub mod prioritiser;
pub mod processor;
