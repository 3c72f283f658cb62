// src/common/i18n.rs

use std::{collections::HashMap, sync::Arc};

pub const DEFAULT_LANG: &str = "es";

// (idioma, código) -> mensagem
const MESSAGES: &[(&str, &str, &str)] = &[
    ("es", "validation_error", "Uno o más campos no son válidos."),
    ("pt", "validation_error", "Um ou mais campos são inválidos."),
    ("en", "validation_error", "One or more fields are invalid."),
    ("es", "invalid_credentials", "Correo o contraseña incorrectos."),
    ("pt", "invalid_credentials", "E-mail ou senha inválidos."),
    ("en", "invalid_credentials", "Invalid email or password."),
    ("es", "invalid_token", "Sesión inválida o expirada."),
    ("pt", "invalid_token", "Token de autenticação inválido ou ausente."),
    ("en", "invalid_token", "Invalid or missing session token."),
    ("es", "customer_not_found", "Cliente no encontrado."),
    ("pt", "customer_not_found", "Cliente não encontrado."),
    ("en", "customer_not_found", "Customer not found."),
    ("es", "unknown_filter", "Filtro de estado de pago desconocido."),
    ("pt", "unknown_filter", "Filtro de situação de pagamento desconhecido."),
    ("en", "unknown_filter", "Unknown payment status filter."),
    ("es", "empty_selection", "Por favor, selecciona al menos un cliente."),
    ("pt", "empty_selection", "Selecione pelo menos um cliente."),
    ("en", "empty_selection", "Select at least one customer."),
    ("es", "no_resolvable_plates", "Los clientes seleccionados no tienen matrícula."),
    ("pt", "no_resolvable_plates", "Os clientes selecionados não possuem placa."),
    ("en", "no_resolvable_plates", "The selected customers have no license plate."),
    ("es", "operation_in_progress", "Ya hay una operación en curso, inténtalo en unos segundos."),
    ("pt", "operation_in_progress", "Já existe uma operação em andamento, tente novamente em instantes."),
    ("en", "operation_in_progress", "Another operation is in progress, try again shortly."),
    ("es", "webhook_failed", "Error al comunicarse con el servidor de membresías"),
    ("pt", "webhook_failed", "Falha ao comunicar com o servidor de assinaturas"),
    ("en", "webhook_failed", "Membership server request failed"),
    ("es", "internal_error", "Ocurrió un error inesperado."),
    ("pt", "internal_error", "Ocorreu um erro inesperado."),
    ("en", "internal_error", "An unexpected error occurred."),
    // Códigos de validação de payload
    ("es", "invalid_email", "Por favor, introduce un correo válido."),
    ("pt", "invalid_email", "O e-mail fornecido é inválido."),
    ("en", "invalid_email", "Please provide a valid email."),
    ("es", "required", "Campo obligatorio."),
    ("pt", "required", "Campo obrigatório."),
    ("en", "required", "This field is required."),
];

#[derive(Clone)]
pub struct I18nStore {
    // idioma -> código -> mensagem
    messages: Arc<HashMap<&'static str, HashMap<&'static str, &'static str>>>,
}

impl I18nStore {
    pub fn new() -> Self {
        let mut messages: HashMap<&'static str, HashMap<&'static str, &'static str>> = HashMap::new();
        for (lang, code, message) in MESSAGES {
            messages.entry(*lang).or_default().insert(*code, *message);
        }
        Self { messages: Arc::new(messages) }
    }

    /// Idioma desconhecido cai no espanhol; código desconhecido volta como está.
    pub fn translate(&self, lang: &str, code: &str) -> String {
        let lookup = |lang: &str| self.messages.get(lang).and_then(|by_code| by_code.get(code));
        lookup(lang)
            .or_else(|| lookup(DEFAULT_LANG))
            .map(|m| m.to_string())
            .unwrap_or_else(|| code.to_string())
    }
}

impl Default for I18nStore {
    fn default() -> Self {
        Self::new()
    }
}
