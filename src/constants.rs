pub const HEADER_JSON: &str = "application/json; charset=utf-8";

pub const DEFAULT_URL_PREFIX: &str = "/make-server-bec4bad8";
pub const AUDIT_LOG_LIMIT: usize = 100;

pub const KEY_PREFIX_OFFICER: &str = "policial";
pub const KEY_PREFIX_PERSON: &str = "pessoa";
pub const KEY_PREFIX_REPORT: &str = "boletim";
pub const KEY_PREFIX_LOG: &str = "log";
pub const KEY_PREFIX_AUTH_USER: &str = "auth:user";
pub const KEY_PREFIX_AUTH_TOKEN: &str = "auth:token";

pub const STORAGE_KEY_USER: &str = "bo_user";
pub const STORAGE_KEY_TOKEN: &str = "bo_token";
pub const STORAGE_KEY_ROSTER: &str = "bo_policiais";

pub const DEFAULT_OFFICER_PASSWORD: &str = "pn2024";
pub const LEGACY_OFFICER_PASSWORD: &str = "123456";
pub const ANONYMOUS_API_KEY: &str = "demo-anon-key";

pub const API_ERROR_INTERNAL: &str = "Erro interno do servidor";
pub const API_ERROR_NOT_FOUND: &str = "Rota não encontrada";
pub const API_ERROR_INVALID_BODY: &str = "Corpo da requisição inválido";
pub const API_ERROR_BODY_TOO_LARGE: &str = "Corpo da requisição demasiado grande";
pub const API_ERROR_TOKEN_MISSING: &str = "Token de acesso não fornecido";
pub const API_ERROR_TOKEN_INVALID: &str = "Token de acesso inválido";

pub const API_ERROR_SIGNUP_FIELDS: &str = "Todos os campos são obrigatórios";
pub const API_ERROR_BADGE_TAKEN: &str = "Matrícula já cadastrada";
pub const API_ERROR_BADGE_FORMAT: &str = "Matrícula deve ter o formato PN000000";
pub const API_ERROR_RANK_UNKNOWN: &str = "Posto/Patente inválido";
pub const API_ERROR_PASSWORD_SHORT: &str = "Palavra-passe demasiado curta";
pub const API_ERROR_EMAIL_TAKEN: &str = "Email já registado";
pub const API_ERROR_LOGIN_FIELDS: &str = "Matrícula e senha são obrigatórios";
pub const API_ERROR_BADGE_UNKNOWN: &str = "Matrícula não encontrada";
pub const API_ERROR_OFFICER_MISSING: &str = "Dados do policial não encontrados";
pub const API_ERROR_BAD_CREDENTIALS: &str = "Credenciais inválidas";

pub const API_ERROR_REPORT_FIELDS: &str = "Campos obrigatórios não preenchidos";
pub const API_ERROR_REPORT_NUMBER_TAKEN: &str = "Número do boletim já existe";
pub const API_ERROR_REPORT_NOT_FOUND: &str = "Boletim não encontrado";
pub const API_ERROR_PERSON_FIELDS: &str = "Nome e tipo são obrigatórios";
pub const API_ERROR_PERSON_ID_FORMAT: &str =
    "Formato do B.I inválido. Use o formato: 000000000AA000";
pub const API_ERROR_PERSON_NOT_FOUND: &str = "Pessoa não encontrada";

pub const API_FAILURE_LIST_REPORTS: &str = "Erro ao buscar boletins";
pub const API_FAILURE_CREATE_REPORT: &str = "Erro ao criar boletim";
pub const API_FAILURE_GET_REPORT: &str = "Erro ao buscar boletim";
pub const API_FAILURE_UPDATE_REPORT: &str = "Erro ao atualizar boletim";
pub const API_FAILURE_SEARCH_REPORTS: &str = "Erro na busca de boletins";
pub const API_FAILURE_LIST_PERSONS: &str = "Erro ao buscar pessoas";
pub const API_FAILURE_CREATE_PERSON: &str = "Erro ao cadastrar pessoa";
pub const API_FAILURE_UPDATE_PERSON: &str = "Erro ao atualizar pessoa";
pub const API_FAILURE_DELETE_PERSON: &str = "Erro ao deletar pessoa";
pub const API_FAILURE_LIST_OFFICERS: &str = "Erro ao buscar policiais";
pub const API_FAILURE_STATISTICS: &str = "Erro ao gerar estatísticas";
pub const API_FAILURE_LOGS: &str = "Erro ao buscar logs";

pub const API_MESSAGE_OFFICER_CREATED: &str = "Policial cadastrado com sucesso";
pub const API_MESSAGE_LOGGED_IN: &str = "Login realizado com sucesso";
pub const API_MESSAGE_REPORT_CREATED: &str = "Boletim criado com sucesso";
pub const API_MESSAGE_REPORT_UPDATED: &str = "Boletim atualizado com sucesso";
pub const API_MESSAGE_PERSON_CREATED: &str = "Pessoa cadastrada com sucesso";
pub const API_MESSAGE_PERSON_UPDATED: &str = "Pessoa atualizada com sucesso";
pub const API_MESSAGE_PERSON_DELETED: &str = "Pessoa deletada com sucesso";

pub const CLIENT_ERROR_DEMO_MODE: &str =
    "Sistema em modo demonstração - algumas funcionalidades podem estar limitadas";
pub const CLIENT_ERROR_INVALID_CREDENTIALS: &str = "Matrícula ou palavra-passe incorretos";
